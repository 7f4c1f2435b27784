//! Simulated scrape job.
//!
//! [`ScrapeSimulator`] is a [`ScrapeTrigger`] that behaves like the real
//! pipeline: it acknowledges immediately, then lands records for each
//! company in an [`InMemoryRecordStore`] after that company's latency.
//! Latencies are fixed per company or drawn from a seeded RNG so runs are
//! reproducible.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pullup_flow::store::InMemoryRecordStore;
//! use pullup_test_utils::simulation::ScrapeSimulator;
//!
//! let store = Arc::new(InMemoryRecordStore::new());
//! let simulator = ScrapeSimulator::new(Arc::clone(&store))
//!     .with_latency(Duration::from_secs(40))
//!     .with_entity_latency("Google", Duration::from_secs(55))
//!     .losing("Initech");
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pullup_core::{EntityKey, EntitySet};
use pullup_flow::error::Result;
use pullup_flow::store::InMemoryRecordStore;
use pullup_flow::trigger::{Acknowledgement, ScrapeTrigger};

use crate::fixtures::RecordFactory;

#[derive(Debug)]
struct SeededLatency {
    rng: StdRng,
    range_ms: Range<u64>,
}

/// Trigger that lands records in a store after a delay.
#[derive(Debug, Clone)]
pub struct ScrapeSimulator {
    store: Arc<InMemoryRecordStore>,
    default_latency: Duration,
    latencies: HashMap<EntityKey, Duration>,
    lost: EntitySet,
    records_per_entity: usize,
    seeded: Option<Arc<Mutex<SeededLatency>>>,
    calls: Arc<Mutex<Vec<EntitySet>>>,
}

impl ScrapeSimulator {
    /// Creates a simulator writing into `store` with a 40 second latency.
    #[must_use]
    pub fn new(store: Arc<InMemoryRecordStore>) -> Self {
        Self {
            store,
            default_latency: Duration::from_secs(40),
            latencies: HashMap::new(),
            lost: EntitySet::new(),
            records_per_entity: 2,
            seeded: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sets the latency for companies without their own.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Sets the latency for one company.
    #[must_use]
    pub fn with_entity_latency(mut self, company: &str, latency: Duration) -> Self {
        self.latencies.insert(EntityKey::new(company), latency);
        self
    }

    /// Draws latencies for companies without their own from a seeded RNG.
    #[must_use]
    pub fn with_seeded_latencies(mut self, seed: u64, range: Range<Duration>) -> Self {
        let to_ms = |d: Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        self.seeded = Some(Arc::new(Mutex::new(SeededLatency {
            rng: StdRng::seed_from_u64(seed),
            range_ms: to_ms(range.start)..to_ms(range.end),
        })));
        self
    }

    /// Marks a company whose records never appear.
    #[must_use]
    pub fn losing(mut self, company: &str) -> Self {
        self.lost
            .insert(pullup_core::Entity::parse(company).expect("valid company name"));
        self
    }

    /// Sets how many records land per company.
    #[must_use]
    pub const fn with_records_per_entity(mut self, count: usize) -> Self {
        self.records_per_entity = count;
        self
    }

    /// Returns the entity set of every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<EntitySet> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn latency_for(&self, key: &EntityKey) -> Duration {
        if let Some(latency) = self.latencies.get(key) {
            return *latency;
        }
        match &self.seeded {
            Some(seeded) => {
                let mut seeded = seeded.lock().unwrap();
                let range = seeded.range_ms.clone();
                let ms = if range.is_empty() {
                    range.start
                } else {
                    seeded.rng.gen_range(range)
                };
                Duration::from_millis(ms)
            }
            None => self.default_latency,
        }
    }
}

#[async_trait]
impl ScrapeTrigger for ScrapeSimulator {
    async fn start_scrape(&self, entities: &EntitySet) -> Result<Acknowledgement> {
        self.calls.lock().unwrap().push(entities.clone());

        for entity in entities {
            if self.lost.contains(entity) {
                tracing::debug!(company = entity.name(), "simulated scrape loses company");
                continue;
            }
            let latency = self.latency_for(entity.key());
            let store = Arc::clone(&self.store);
            let records = RecordFactory::many(entity.name(), self.records_per_entity);
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                store.insert_many(records).expect("simulated insert");
            });
        }

        Ok(Acknowledgement::accepted(
            entities.names(),
            Some("Scraping initiated".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::entities;
    use pullup_flow::store::RecordStore;

    #[tokio::test(start_paused = true)]
    async fn records_land_after_latency() {
        let store = Arc::new(InMemoryRecordStore::new());
        let simulator = ScrapeSimulator::new(Arc::clone(&store))
            .with_latency(Duration::from_secs(10))
            .losing("B");
        let query = entities(&["A", "B"]);

        let ack = simulator.start_scrape(&query).await.unwrap();
        assert!(ack.accepted);
        assert!(store.find_by_entities(&query).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(11)).await;
        let rows = store.find_by_entities(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.company_name == "A"));
    }

    #[test]
    fn seeded_latencies_are_reproducible() {
        let store = Arc::new(InMemoryRecordStore::new());
        let range = Duration::from_secs(5)..Duration::from_secs(50);
        let a = ScrapeSimulator::new(Arc::clone(&store)).with_seeded_latencies(7, range.clone());
        let b = ScrapeSimulator::new(store).with_seeded_latencies(7, range);

        let key = EntityKey::new("x");
        let first: Vec<Duration> = (0..5).map(|_| a.latency_for(&key)).collect();
        let second: Vec<Duration> = (0..5).map(|_| b.latency_for(&key)).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|d| *d >= Duration::from_secs(5)));
    }
}
