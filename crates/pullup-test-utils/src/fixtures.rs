//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create test data with sensible defaults.

use std::sync::Arc;
use std::time::Duration;

use pullup_core::{EntitySet, Record};
use pullup_flow::config::ReconcileConfig;
use pullup_flow::engine::ReconciliationEngine;
use pullup_flow::store::InMemoryRecordStore;
use pullup_flow::trigger::InMemoryScrapeTrigger;

/// Settle wait used by [`test_config`].
pub const TEST_SETTLE_WAIT: Duration = Duration::from_secs(30);
/// Poll interval used by [`test_config`].
pub const TEST_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Poll budget used by [`test_config`].
pub const TEST_POLL_BUDGET: u32 = 4;
/// Final settle wait used by [`test_config`].
pub const TEST_FINAL_SETTLE_WAIT: Duration = Duration::from_secs(60);

/// Returns a configuration with a small poll budget.
///
/// Waits keep their production magnitudes; tests run with paused Tokio time
/// so they cost nothing.
#[must_use]
pub fn test_config() -> ReconcileConfig {
    ReconcileConfig::default()
        .with_settle_wait(TEST_SETTLE_WAIT)
        .with_poll_interval(TEST_POLL_INTERVAL)
        .with_poll_budget(TEST_POLL_BUDGET)
        .with_final_settle_wait(TEST_FINAL_SETTLE_WAIT)
        .with_call_timeout(Duration::from_secs(10))
}

/// Parses company names into an entity set.
#[must_use]
pub fn entities(names: &[&str]) -> EntitySet {
    EntitySet::parse(names).expect("valid company names")
}

/// Test context with an in-memory store and a recording trigger.
pub struct TestContext {
    /// Shared record store.
    pub store: Arc<InMemoryRecordStore>,
    /// Shared scrape trigger.
    pub trigger: Arc<InMemoryScrapeTrigger>,
    /// Engine configuration.
    pub config: ReconcileConfig,
}

impl TestContext {
    /// Creates a context with an empty store and an accepting trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::with_trigger(InMemoryScrapeTrigger::accepting())
    }

    /// Creates a context with a specific trigger.
    #[must_use]
    pub fn with_trigger(trigger: InMemoryScrapeTrigger) -> Self {
        Self {
            store: Arc::new(InMemoryRecordStore::new()),
            trigger: Arc::new(trigger),
            config: test_config(),
        }
    }

    /// Builds an engine over this context's collaborators.
    #[must_use]
    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(
            self.store.clone(),
            self.trigger.clone(),
            self.config.clone(),
        )
        .expect("valid test config")
    }

    /// Parses company names into an entity set.
    #[must_use]
    pub fn entities(&self, names: &[&str]) -> EntitySet {
        entities(names)
    }

    /// Inserts one default record per company into the store.
    pub fn seed(&self, companies: &[&str]) {
        self.store
            .insert_many(companies.iter().map(|c| RecordFactory::record(c)))
            .expect("seed store");
    }

    /// Returns the number of trigger calls so far.
    #[must_use]
    pub fn trigger_calls(&self) -> usize {
        self.trigger.call_count().expect("trigger calls")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory for product records.
pub struct RecordFactory;

impl RecordFactory {
    /// Creates a record with default price, rating and review count.
    #[must_use]
    pub fn record(company: &str) -> Record {
        Self::rated(company, &format!("{company} Flagship"), 4.0, 100)
    }

    /// Creates a record with a specific rating and review count.
    #[must_use]
    pub fn rated(company: &str, product: &str, rating: f64, reviews: u64) -> Record {
        Record::new(company, product, 199.99, rating, reviews).expect("valid record")
    }

    /// Creates `count` distinct records for one company.
    #[must_use]
    pub fn many(company: &str, count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let rating = 3.0 + (i % 3) as f64 * 0.5;
                Self::rated(company, &format!("{company} Model {i}"), rating, 10 * (i as u64 + 1))
            })
            .collect()
    }
}
