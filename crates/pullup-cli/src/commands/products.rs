//! Products command - show what the record store holds right now.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use pullup_core::{EntitySet, RecordSet};
use pullup_flow::context::ReconcileRequest;
use pullup_flow::store::RecordStore;

use crate::render::{self, Outcome};
use crate::{Config, OutputFormat};

/// Arguments for the products command.
#[derive(Debug, Args)]
pub struct ProductsArgs {
    /// Companies to look up (space or comma separated).
    #[arg(required = true, value_delimiter = ',')]
    pub companies: Vec<String>,

    /// Show only the best-rated product per company.
    #[arg(long, short = 'b')]
    pub best: bool,

    /// Request timeout in seconds.
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

/// Execute the products command.
///
/// Companies without data are listed but are not an error.
///
/// # Errors
///
/// Returns an error if the company list is invalid or the store query fails.
pub async fn execute(args: ProductsArgs, config: &Config) -> Result<()> {
    let request = ReconcileRequest::parse(&args.companies).context("Invalid company list")?;
    let store = config.record_store(Duration::from_secs(args.timeout))?;

    let rows = store
        .find_by_entities(request.entities())
        .await
        .context("Failed to query record store")?;
    let (records, missing) = select(request.entities(), rows.into(), args.best);

    if matches!(config.format, OutputFormat::Json) {
        return render::print_outcome(&Outcome {
            status: "succeeded",
            error: None,
            unresolved: missing.names(),
            records: &records,
        });
    }

    render::print_records(&records, &config.format)?;
    render::print_missing(&missing);
    Ok(())
}

/// Keeps the records of `requested` entities and reports which have none.
fn select(requested: &EntitySet, mut records: RecordSet, best: bool) -> (RecordSet, EntitySet) {
    records.retain_entities(requested);
    let found = records.entities();
    let missing = requested
        .iter()
        .filter(|e| !found.contains(e))
        .cloned()
        .collect();
    let records = if best {
        records.best_per_entity()
    } else {
        records
    };
    (records, missing)
}
