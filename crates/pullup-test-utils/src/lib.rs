//! Shared test utilities for pullup integration tests.
//!
//! This crate provides:
//! - [`ScriptedRecordStore`]: Record store answering from a script
//! - [`ScriptedScrapeTrigger`]: Scrape trigger with a fixed reply, a
//!   failure or a hang
//! - [`ScrapeSimulator`]: Trigger that lands records in an in-memory store
//!   after a per-company latency
//! - [`TestContext`] and [`RecordFactory`]: Fixtures with sensible defaults
//! - Custom assertion helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use pullup_test_utils::{TestContext, assert_entities};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     ctx.seed(&["Apple"]);
//!     let records = ctx.engine().reconcile(&ctx.entities(&["Apple"])).await.unwrap();
//!     assert_entities(&records, &["Apple"]);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod scripted;
pub mod simulation;

pub use assertions::*;
pub use fixtures::*;
pub use scripted::*;
pub use simulation::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pullup_flow=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
