//! # pullup-cli
//!
//! Command-line interface for pullup product comparisons.
//!
//! ## Commands
//!
//! - `pullup compare` - Reconcile companies and show their products
//! - `pullup scrape` - Start a scrape job without waiting for it
//! - `pullup products` - Show what the record store holds right now
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `PULLUP_STORE_URL` - Record store base URL
//! - `PULLUP_STORE_KEY` - Record store API key
//! - `PULLUP_STORE_TABLE` - Product table (default: `products`)
//! - `PULLUP_TRIGGER_URL` - Scrape trigger URL (default: `http://localhost:8000`)
//! - `PULLUP_SETTLE_WAIT_SECS`, `PULLUP_POLL_INTERVAL_SECS`,
//!   `PULLUP_POLL_BUDGET`, `PULLUP_FINAL_SETTLE_WAIT_SECS`,
//!   `PULLUP_CALL_TIMEOUT_SECS` - Reconciliation timing

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod render;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pullup_core::observability::LogFormat;
use pullup_flow::store::{RestRecordStore, RestStoreConfig, rest::DEFAULT_TABLE};
use pullup_flow::trigger::http::DEFAULT_TRIGGER_URL;
use pullup_flow::trigger::{HttpScrapeTrigger, HttpTriggerConfig};

/// Pullup CLI - compare products across companies.
#[derive(Debug, Parser)]
#[command(name = "pullup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Record store base URL.
    #[arg(long, env = "PULLUP_STORE_URL")]
    pub store_url: Option<String>,

    /// Record store API key.
    #[arg(long, env = "PULLUP_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    /// Record store product table.
    #[arg(long, env = "PULLUP_STORE_TABLE", default_value = DEFAULT_TABLE)]
    pub store_table: String,

    /// Scrape trigger service URL.
    #[arg(long, env = "PULLUP_TRIGGER_URL", default_value = DEFAULT_TRIGGER_URL)]
    pub trigger_url: String,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Log format (pretty, compact or json).
    #[arg(long, env = "PULLUP_LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            store_url: self.store_url.clone(),
            store_key: self.store_key.clone(),
            store_table: self.store_table.clone(),
            trigger_url: self.trigger_url.clone(),
            format: self.format.clone(),
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile companies and show their products.
    Compare(commands::compare::CompareArgs),
    /// Start a scrape job without waiting for results.
    Scrape(commands::scrape::ScrapeArgs),
    /// Show products already in the record store.
    Products(commands::products::ProductsArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Table output.
    Table,
}

/// CLI configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Record store base URL.
    pub store_url: Option<String>,
    /// Record store API key.
    pub store_key: Option<String>,
    /// Record store product table.
    pub store_table: String,
    /// Scrape trigger service URL.
    pub trigger_url: String,
    /// Output format.
    pub format: OutputFormat,
}

impl Config {
    /// Builds the record store client.
    ///
    /// # Errors
    ///
    /// Returns an error if the store URL is missing or the client cannot be
    /// constructed.
    pub fn record_store(&self, timeout: Duration) -> Result<RestRecordStore> {
        let url = self
            .store_url
            .as_deref()
            .context("Record store URL is required. Set PULLUP_STORE_URL or use --store-url")?;

        let mut store = RestStoreConfig::new(url)
            .with_table(&self.store_table)
            .with_timeout(timeout);
        if let Some(key) = &self.store_key {
            store = store.with_api_key(key);
        }
        RestRecordStore::new(store).context("Failed to create record store client")
    }

    /// Builds the scrape trigger client.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    pub fn scrape_trigger(&self, timeout: Duration) -> Result<HttpScrapeTrigger> {
        HttpScrapeTrigger::new(HttpTriggerConfig::new(&self.trigger_url).with_timeout(timeout))
            .context("Failed to create scrape trigger client")
    }
}
