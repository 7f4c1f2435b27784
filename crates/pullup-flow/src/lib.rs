//! # pullup-flow
//!
//! Availability reconciliation for pullup.
//!
//! Given a set of companies, the engine returns their product records. Data
//! that is not in the record store yet is produced by an out-of-process
//! scrape job with unknown latency, so the engine triggers that job once for
//! the missing companies and then settles and polls until the records show
//! up or the poll budget runs out.
//!
//! ## Core Concepts
//!
//! - **Request**: The set of companies one invocation works on
//! - **State machine**: Typed states and a pure transition function
//! - **Poll policy**: Settle wait, poll interval, poll budget, final settle
//! - **Context**: The per-invocation available/pending partition and records
//! - **Collaborators**: [`RecordStore`](store::RecordStore) and
//!   [`ScrapeTrigger`](trigger::ScrapeTrigger)
//!
//! ## Guarantees
//!
//! - **Fast path**: If the store has everything, nothing is triggered
//! - **One trigger**: At most one scrape call per invocation
//! - **Partition**: available ∪ pending = request, available ∩ pending = ∅
//! - **Monotonic**: Companies only move from pending to available
//! - **Partial results**: Failures after the initial check carry the
//!   records resolved so far
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use pullup_core::{EntitySet, Record};
//! use pullup_flow::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> pullup_flow::error::Result<()> {
//! let store = Arc::new(InMemoryRecordStore::new());
//! store.insert(Record::new("Apple", "iPad Pro", 799.0, 4.7, 1200)?)?;
//!
//! let engine = ReconciliationEngine::new(
//!     store,
//!     Arc::new(InMemoryScrapeTrigger::accepting()),
//!     ReconcileConfig::default(),
//! )?;
//!
//! let records = engine.reconcile(&EntitySet::parse(["apple"])?).await?;
//! assert_eq!(records.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod session;
pub mod state;
pub mod store;
pub mod trigger;
pub mod update;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::ReconcileConfig;
    pub use crate::context::{ReconcileContext, ReconcileRequest};
    pub use crate::engine::ReconciliationEngine;
    pub use crate::error::{Error, Result};
    pub use crate::policy::PollPolicy;
    pub use crate::session::{ReconcileHandle, ReconcileSession};
    pub use crate::state::{ReconcileEvent, ReconcileState};
    pub use crate::store::{InMemoryRecordStore, RecordStore, RestRecordStore, RestStoreConfig};
    pub use crate::trigger::{
        Acknowledgement, HttpScrapeTrigger, HttpTriggerConfig, InMemoryScrapeTrigger,
        ScrapeTrigger,
    };
    pub use crate::update::ReconcileUpdate;
}
