//! Record store abstraction.
//!
//! This module provides:
//!
//! - [`RecordStore`]: Trait for looking up records by entity
//! - [`InMemoryRecordStore`]: In-memory store for testing and local runs
//! - [`RestRecordStore`]: PostgREST-compatible HTTP store
//!
//! ## Contract
//!
//! - **Empty is not an error**: an entity with no rows is simply pending
//! - **Case-insensitive**: `apple` and `Apple` name the same entity
//! - **Failures are failures**: a transport or query error is returned as
//!   [`Error::StoreFailure`](crate::error::Error::StoreFailure), never as an
//!   empty result
//! - **Read-only**: lookups have no side effects on the store

pub mod memory;
pub mod rest;

use async_trait::async_trait;

use pullup_core::{EntitySet, Record};

use crate::error::Result;

pub use memory::InMemoryRecordStore;
pub use rest::{RestRecordStore, RestStoreConfig};

/// A queryable collection of previously produced records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every record whose entity is in `entities`.
    ///
    /// Implementations may return rows for other entities; callers filter
    /// them out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreFailure`](crate::error::Error::StoreFailure) if
    /// the query itself fails.
    async fn find_by_entities(&self, entities: &EntitySet) -> Result<Vec<Record>>;
}
