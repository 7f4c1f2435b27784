//! Pullup CLI - product comparisons across companies.
//!
//! The main entry point for the `pullup` CLI binary.

use anyhow::Result;
use clap::Parser;

use pullup_cli::{Cli, Commands};
use pullup_core::observability::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, "warn");
    let config = cli.config();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Compare(args) => pullup_cli::commands::compare::execute(args, &config).await,
            Commands::Scrape(args) => pullup_cli::commands::scrape::execute(args, &config).await,
            Commands::Products(args) => {
                pullup_cli::commands::products::execute(args, &config).await
            }
        }
    })
}
