//! Compare command - reconcile companies and show their products.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use pullup_flow::config::ReconcileConfig;
use pullup_flow::context::ReconcileRequest;
use pullup_flow::engine::ReconciliationEngine;
use pullup_flow::error::Error;

use crate::render::{self, Outcome};
use crate::{Config, OutputFormat};

/// Arguments for the compare command.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Companies to compare (space or comma separated).
    #[arg(required = true, value_delimiter = ',')]
    pub companies: Vec<String>,

    /// Show only the best-rated product per company.
    #[arg(long, short = 'b')]
    pub best: bool,

    /// Do not print progress while waiting.
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Seconds to wait after triggering a scrape before the first poll.
    #[arg(long)]
    pub settle_wait: Option<u64>,

    /// Seconds between polls.
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Number of polls before the final wait.
    #[arg(long)]
    pub poll_budget: Option<u32>,

    /// Seconds to wait before the final check.
    #[arg(long)]
    pub final_settle_wait: Option<u64>,

    /// Timeout in seconds for each store query and trigger call.
    #[arg(long)]
    pub call_timeout: Option<u64>,
}

impl CompareArgs {
    /// Builds the reconciliation config: environment first, flags on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment or the resulting config is
    /// invalid.
    pub fn reconcile_config(&self) -> Result<ReconcileConfig> {
        let config = ReconcileConfig::from_env().context("Invalid PULLUP_* timing settings")?;
        self.apply_overrides(config)
    }

    fn apply_overrides(&self, mut config: ReconcileConfig) -> Result<ReconcileConfig> {
        if let Some(secs) = self.settle_wait {
            config = config.with_settle_wait(Duration::from_secs(secs));
        }
        if let Some(secs) = self.poll_interval {
            config = config.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(budget) = self.poll_budget {
            config = config.with_poll_budget(budget);
        }
        if let Some(secs) = self.final_settle_wait {
            config = config.with_final_settle_wait(Duration::from_secs(secs));
        }
        if let Some(secs) = self.call_timeout {
            config = config.with_call_timeout(Duration::from_secs(secs));
        }
        config.validate().context("Invalid timing flags")?;
        Ok(config)
    }
}

/// Execute the compare command.
///
/// # Errors
///
/// Returns an error if the company list or configuration is invalid, or the
/// reconciliation ends without data for every company. Partial results are
/// printed before the error is returned.
pub async fn execute(args: CompareArgs, config: &Config) -> Result<()> {
    let request = ReconcileRequest::parse(&args.companies).context("Invalid company list")?;
    let reconcile = args.reconcile_config()?;

    let engine = ReconciliationEngine::new(
        Arc::new(config.record_store(reconcile.call_timeout)?),
        Arc::new(config.scrape_trigger(reconcile.call_timeout)?),
        reconcile,
    )?;
    let max_wait = engine.policy().max_wait();

    let mut handle = engine.spawn(request.entities().clone());
    tracing::debug!(invocation = %handle.invocation_id(), ?max_wait, "comparison started");

    while let Some(update) = handle.next_update().await {
        if !args.quiet {
            render::print_update(&update, &config.format);
        }
    }

    match handle.join().await {
        Ok(records) => {
            let records = if args.best {
                records.best_per_entity()
            } else {
                records
            };
            if matches!(config.format, OutputFormat::Json) {
                render::print_outcome(&Outcome {
                    status: "succeeded",
                    error: None,
                    unresolved: Vec::new(),
                    records: &records,
                })
            } else {
                render::print_records(&records, &config.format)
            }
        }
        Err(error) => {
            report_failure(&error, args.best, &config.format)?;
            Err(anyhow::Error::new(error)).context("Comparison failed")
        }
    }
}

fn report_failure(error: &Error, best: bool, format: &OutputFormat) -> Result<()> {
    let partial = error.partial_records().cloned().unwrap_or_default();
    let partial = if best {
        partial.best_per_entity()
    } else {
        partial
    };
    let unresolved = match error {
        Error::UnavailableAfterScrape { unresolved, .. } => unresolved.clone(),
        _ => Vec::new(),
    };

    if matches!(format, OutputFormat::Json) {
        return render::print_outcome(&Outcome {
            status: error.as_label(),
            error: Some(error.to_string()),
            unresolved,
            records: &partial,
        });
    }

    if !partial.is_empty() {
        println!("Partial results:");
        render::print_records(&partial, format)?;
    }
    Ok(())
}
