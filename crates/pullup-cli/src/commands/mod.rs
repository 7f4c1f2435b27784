//! CLI subcommands.

pub mod compare;
pub mod products;
pub mod scrape;
