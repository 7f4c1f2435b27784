//! In-memory record store.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence, no distribution
//! - **Linear scan**: every lookup walks all rows

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use pullup_core::{EntitySet, Record};

use super::RecordStore;
use crate::error::{Error, Result};

/// In-memory record store.
///
/// Thread-safe; rows can be inserted while an invocation is polling, which is
/// how tests model a scrape job landing data.
///
/// ## Example
///
/// ```rust
/// use pullup_core::Record;
/// use pullup_flow::store::InMemoryRecordStore;
///
/// let store = InMemoryRecordStore::new();
/// store.insert(Record::new("Apple", "iPad", 799.0, 4.7, 1200).unwrap()).unwrap();
/// assert_eq!(store.len().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    rows: RwLock<Vec<Record>>,
    queries: AtomicUsize,
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::store("record store lock poisoned")
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with rows.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            rows: RwLock::new(records.into_iter().collect()),
            queries: AtomicUsize::new(0),
        }
    }

    /// Adds a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert(&self, record: Record) -> Result<()> {
        self.rows.write().map_err(poison_err)?.push(record);
        Ok(())
    }

    /// Adds several rows at once; readers see all or none of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_many(&self, records: impl IntoIterator<Item = Record>) -> Result<()> {
        self.rows.write().map_err(poison_err)?.extend(records);
        Ok(())
    }

    /// Removes every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        self.rows.write().map_err(poison_err)?.clear();
        Ok(())
    }

    /// Returns the number of rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.rows.read().map_err(poison_err)?.len())
    }

    /// Returns true if the store holds no rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.rows.read().map_err(poison_err)?.is_empty())
    }

    /// Returns how many lookups have been served.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_by_entities(&self, entities: &EntitySet) -> Result<Vec<Record>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.read().map_err(poison_err)?;
        Ok(rows
            .iter()
            .filter(|r| entities.contains_key(&r.entity_key()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(company: &str) -> Record {
        Record::new(company, "widget", 1.0, 3.0, 7).unwrap()
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let store = InMemoryRecordStore::with_records([record("Apple"), record("Google")]);
        let rows = store
            .find_by_entities(&EntitySet::parse(["APPLE"]).unwrap())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].company_name, "Apple");
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let store = InMemoryRecordStore::new();
        let rows = store
            .find_by_entities(&EntitySet::parse(["Nobody"]).unwrap())
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn inserts_become_visible() {
        let store = InMemoryRecordStore::new();
        let query = EntitySet::parse(["Acme"]).unwrap();
        assert!(store.find_by_entities(&query).await.unwrap().is_empty());

        store.insert_many([record("acme"), record("ACME")]).unwrap();
        assert_eq!(store.find_by_entities(&query).await.unwrap().len(), 2);

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }
}
