//! In-memory scrape trigger for testing.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use pullup_core::EntitySet;

use super::{Acknowledgement, ScrapeTrigger};
use crate::error::{Error, Result, TRIGGER_FALLBACK_MESSAGE};

#[derive(Debug, Clone)]
enum Behavior {
    Accept,
    Reject(Option<String>),
    Unreachable,
}

/// Scrape trigger that records every call and answers with a fixed reply.
///
/// ## Example
///
/// ```rust
/// use pullup_flow::trigger::InMemoryScrapeTrigger;
///
/// let trigger = InMemoryScrapeTrigger::accepting();
/// assert_eq!(trigger.call_count().unwrap(), 0);
/// ```
#[derive(Debug)]
pub struct InMemoryScrapeTrigger {
    behavior: Behavior,
    calls: RwLock<Vec<EntitySet>>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::trigger("scrape trigger lock poisoned")
}

impl Default for InMemoryScrapeTrigger {
    fn default() -> Self {
        Self::accepting()
    }
}

impl InMemoryScrapeTrigger {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Creates a trigger that accepts every request.
    #[must_use]
    pub fn accepting() -> Self {
        Self::with_behavior(Behavior::Accept)
    }

    /// Creates a trigger that declines every request.
    #[must_use]
    pub fn rejecting(message: Option<String>) -> Self {
        Self::with_behavior(Behavior::Reject(message))
    }

    /// Creates a trigger that behaves like an unreachable service.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::with_behavior(Behavior::Unreachable)
    }

    /// Returns the entity sets passed to every call so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn calls(&self) -> Result<Vec<EntitySet>> {
        Ok(self.calls.read().map_err(poison_err)?.clone())
    }

    /// Returns the number of calls so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn call_count(&self) -> Result<usize> {
        Ok(self.calls.read().map_err(poison_err)?.len())
    }
}

#[async_trait]
impl ScrapeTrigger for InMemoryScrapeTrigger {
    async fn start_scrape(&self, entities: &EntitySet) -> Result<Acknowledgement> {
        self.calls
            .write()
            .map_err(poison_err)?
            .push(entities.clone());

        match &self.behavior {
            Behavior::Accept => Ok(Acknowledgement::accepted(
                entities.names(),
                Some("Scraping initiated".to_string()),
            )),
            Behavior::Reject(message) => Ok(Acknowledgement::rejected(message.clone())),
            Behavior::Unreachable => Err(Error::trigger(TRIGGER_FALLBACK_MESSAGE)),
        }
    }
}
