//! Rendering of record sets and reconciliation updates.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use pullup_core::{EntitySet, Record, RecordSet};
use pullup_flow::update::ReconcileUpdate;

use crate::OutputFormat;

/// One table row per record.
#[derive(Debug, Tabled)]
pub struct RecordRow {
    /// Company name.
    #[tabled(rename = "Company")]
    pub company: String,
    /// Product name.
    #[tabled(rename = "Product")]
    pub product: String,
    /// Formatted price.
    #[tabled(rename = "Price")]
    pub price: String,
    /// Formatted rating.
    #[tabled(rename = "Rating")]
    pub rating: String,
    /// Review count.
    #[tabled(rename = "Reviews")]
    pub reviews: u64,
}

impl From<&Record> for RecordRow {
    fn from(record: &Record) -> Self {
        Self {
            company: record.company_name.clone(),
            product: record.product_name.clone(),
            price: format_price(record.price),
            rating: format!("{:.1}", record.rating),
            reviews: record.reviews,
        }
    }
}

/// Builds table rows ordered by company, then by rank within each company.
#[must_use]
pub fn record_rows(records: &RecordSet) -> Vec<RecordRow> {
    records
        .by_entity()
        .into_values()
        .flat_map(|mut group| {
            group.sort_by(|a, b| a.rank_cmp(b));
            group.into_iter().map(RecordRow::from).collect::<Vec<_>>()
        })
        .collect()
}

/// Formats a price with two decimals and thousands separators.
#[must_use]
pub fn format_price(price: f64) -> String {
    let fixed = format!("{price:.2}");
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let digits: Vec<char> = whole.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    format!("${grouped}.{cents}")
}

fn rating_colored(rating: f64) -> String {
    let text = format!("{rating:.1}");
    if rating >= 4.5 {
        text.green().to_string()
    } else if rating >= 3.5 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

/// Prints `records` in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_records(records: &RecordSet, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(records).context("Failed to serialize records")?
            );
        }
        OutputFormat::Table => {
            let rows = record_rows(records);
            if rows.is_empty() {
                println!("No products found");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No products found");
                return Ok(());
            }
            for mut group in records.by_entity().into_values() {
                group.sort_by(|a, b| a.rank_cmp(b));
                let Some(first) = group.first() else {
                    continue;
                };
                println!("{}", first.company_name.bold());
                for record in &group {
                    println!(
                        "  {:<40} {:>12}  {} ({} reviews)",
                        record.product_name,
                        format_price(record.price),
                        rating_colored(record.rating),
                        record.reviews
                    );
                }
            }
        }
    }
    Ok(())
}

/// Prints a progress update. JSON output stays silent until the end.
pub fn print_update(update: &ReconcileUpdate, format: &OutputFormat) {
    if matches!(format, OutputFormat::Json) {
        return;
    }
    match update {
        ReconcileUpdate::Interim {
            records, pending, ..
        } => {
            if !records.is_empty() {
                println!(
                    "{} {}",
                    "Already available:".dimmed(),
                    records.entities()
                );
            }
            println!("{} {}", "Scraping:".yellow(), pending);
        }
        ReconcileUpdate::Progress {
            attempt,
            resolved,
            pending,
            ..
        } => {
            let waiting = if pending.is_empty() {
                String::new()
            } else {
                format!(" (still waiting for {pending})")
            };
            println!(
                "{} {} after poll {attempt}{waiting}",
                "Resolved:".green(),
                resolved
            );
        }
    }
}

/// Final outcome of a command, as printed in JSON mode.
#[derive(Debug, Serialize)]
pub struct Outcome<'a> {
    /// `succeeded` or the error label.
    pub status: &'a str,
    /// Error message, if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Companies without data.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
    /// Records to show, complete or partial.
    pub records: &'a RecordSet,
}

/// Prints an outcome as pretty JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_outcome(outcome: &Outcome<'_>) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(outcome).context("Failed to serialize outcome")?
    );
    Ok(())
}

/// Prints the companies in `missing` as having no data.
pub fn print_missing(missing: &EntitySet) {
    if !missing.is_empty() {
        println!("{} {}", "No data yet for:".red(), missing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(company: &str, product: &str, rating: f64, reviews: u64) -> Record {
        Record::new(company, product, 1299.5, rating, reviews).unwrap()
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0.0), "$0.00");
        assert_eq!(format_price(999.99), "$999.99");
        assert_eq!(format_price(1299.5), "$1,299.50");
        assert_eq!(format_price(1_234_567.0), "$1,234,567.00");
    }

    #[test]
    fn test_record_rows_group_and_rank() {
        let records: RecordSet = vec![
            record("Samsung", "Galaxy A", 4.0, 10),
            record("apple", "iPad", 4.1, 5),
            record("Samsung", "Galaxy S", 4.8, 900),
        ]
        .into();

        let rows = record_rows(&records);
        let products: Vec<&str> = rows.iter().map(|r| r.product.as_str()).collect();
        assert_eq!(products, vec!["iPad", "Galaxy S", "Galaxy A"]);
        assert_eq!(rows[1].price, "$1,299.50");
        assert_eq!(rows[1].rating, "4.8");
    }

    #[test]
    fn test_outcome_json_shape() {
        let records: RecordSet = vec![record("Apple", "iPhone", 4.5, 10)].into();
        let outcome = Outcome {
            status: "unavailable_after_scrape",
            error: Some("data not available after scraping for: Nokia".to_string()),
            unresolved: vec!["Nokia".to_string()],
            records: &records,
        };

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "unavailable_after_scrape");
        assert_eq!(value["unresolved"][0], "Nokia");
        assert_eq!(value["records"][0]["company_name"], "Apple");
    }
}
