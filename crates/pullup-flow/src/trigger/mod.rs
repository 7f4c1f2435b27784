//! Scrape trigger abstraction.
//!
//! This module provides:
//!
//! - [`ScrapeTrigger`]: Trait for starting a background scrape job
//! - [`Acknowledgement`]: What the trigger service says about the job
//! - [`InMemoryScrapeTrigger`]: Recording trigger for testing
//! - [`HttpScrapeTrigger`]: Client for the `/api/scrape/` endpoint
//!
//! The trigger only starts work; it never returns data. Records appear in
//! the [`RecordStore`](crate::store::RecordStore) some time later.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pullup_core::EntitySet;

use crate::error::Result;

pub use http::{HttpScrapeTrigger, HttpTriggerConfig};
pub use memory::InMemoryScrapeTrigger;

/// Reply from the trigger service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Whether a job was started.
    pub accepted: bool,
    /// Entity names the service accepted; may be a subset of the request.
    #[serde(default)]
    pub entities: Vec<String>,
    /// Human-readable status or error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Acknowledgement {
    /// Creates an accepted acknowledgement.
    #[must_use]
    pub fn accepted(entities: Vec<String>, message: Option<String>) -> Self {
        Self {
            accepted: true,
            entities,
            message,
        }
    }

    /// Creates a rejection with an optional reason.
    #[must_use]
    pub fn rejected(message: Option<String>) -> Self {
        Self {
            accepted: false,
            entities: Vec::new(),
            message,
        }
    }

    /// Returns the requested entities the service did not accept.
    ///
    /// An accepted acknowledgement with an empty entity list is taken to
    /// cover the whole request.
    #[must_use]
    pub fn unaccepted(&self, requested: &EntitySet) -> EntitySet {
        if !self.accepted {
            return requested.clone();
        }
        if self.entities.is_empty() {
            return EntitySet::new();
        }
        requested
            .iter()
            .filter(|e| !self.entities.iter().any(|name| e.matches(name)))
            .cloned()
            .collect()
    }
}

/// Starts background scrape jobs.
#[async_trait]
pub trait ScrapeTrigger: Send + Sync {
    /// Asks the service to scrape `entities`.
    ///
    /// A reachable service that declines returns `Ok` with
    /// `accepted == false`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TriggerFailure`](crate::error::Error::TriggerFailure)
    /// if the service cannot be reached.
    async fn start_scrape(&self, entities: &EntitySet) -> Result<Acknowledgement>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unaccepted_subset() {
        let requested = EntitySet::parse(["A", "B", "C"]).unwrap();
        let ack = Acknowledgement::accepted(vec!["a".into(), "C".into()], None);
        assert_eq!(ack.unaccepted(&requested).names(), vec!["B".to_string()]);

        let blanket = Acknowledgement::accepted(Vec::new(), Some("ok".into()));
        assert!(blanket.unaccepted(&requested).is_empty());

        let rejected = Acknowledgement::rejected(None);
        assert_eq!(rejected.unaccepted(&requested).len(), 3);
    }
}
