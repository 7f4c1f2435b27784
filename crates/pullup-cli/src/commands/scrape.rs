//! Scrape command - start a scrape job without waiting for it.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;

use pullup_flow::context::ReconcileRequest;
use pullup_flow::error::TRIGGER_FALLBACK_MESSAGE;
use pullup_flow::trigger::ScrapeTrigger;

use crate::{Config, OutputFormat};

/// Arguments for the scrape command.
#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Companies to scrape (space or comma separated).
    #[arg(required = true, value_delimiter = ',')]
    pub companies: Vec<String>,

    /// Request timeout in seconds.
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

/// Execute the scrape command.
///
/// # Errors
///
/// Returns an error if the company list is invalid or the trigger service
/// declines or cannot be reached.
pub async fn execute(args: ScrapeArgs, config: &Config) -> Result<()> {
    let request = ReconcileRequest::parse(&args.companies).context("Invalid company list")?;
    let trigger = config.scrape_trigger(Duration::from_secs(args.timeout))?;

    let ack = trigger
        .start_scrape(request.entities())
        .await
        .context("Failed to start scrape")?;

    if !ack.accepted {
        let message = ack.message.as_deref().unwrap_or(TRIGGER_FALLBACK_MESSAGE);
        anyhow::bail!("{message}");
    }
    let unaccepted = ack.unaccepted(request.entities());

    match config.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "accepted": ack.entities,
                    "rejected": unaccepted.names(),
                    "message": ack.message,
                }))
                .context("Failed to serialize response")?
            );
        }
        OutputFormat::Text | OutputFormat::Table => {
            println!(
                "{}",
                ack.message.as_deref().unwrap_or("Scrape started").green()
            );
            println!("  Companies: {}", request.entities());
            if !unaccepted.is_empty() {
                println!("  {} {}", "Not started:".red(), unaccepted);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_args_parsing() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: ScrapeArgs,
        }

        let cli = TestCli::parse_from(["test", "Apple,Nokia", "--timeout", "5"]);
        assert_eq!(cli.args.companies, vec!["Apple", "Nokia"]);
        assert_eq!(cli.args.timeout, 5);
    }
}
