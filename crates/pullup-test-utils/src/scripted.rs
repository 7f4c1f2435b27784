//! Scripted collaborators that record every call.
//!
//! A script is a list of replies consumed one per call; once the script is
//! down to its last reply, that reply repeats forever.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use pullup_core::{EntitySet, Record};
use pullup_flow::error::{Error, Result};
use pullup_flow::store::RecordStore;
use pullup_flow::trigger::{Acknowledgement, ScrapeTrigger};

/// One scripted store reply.
#[derive(Debug, Clone)]
pub enum StoreReply {
    /// Return these rows verbatim (no filtering).
    Rows(Vec<Record>),
    /// Fail with a store error.
    Fail(String),
    /// Never answer.
    Hang,
}

/// Record store that answers from a script.
#[derive(Debug, Clone)]
pub struct ScriptedRecordStore {
    script: Arc<Mutex<VecDeque<StoreReply>>>,
    queries: Arc<Mutex<Vec<EntitySet>>>,
}

impl ScriptedRecordStore {
    /// Creates a store with the given replies.
    ///
    /// An empty script answers every query with no rows.
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = StoreReply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into_iter().collect())),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the entity set of every query so far.
    #[must_use]
    pub fn queries(&self) -> Vec<EntitySet> {
        self.queries.lock().unwrap().clone()
    }

    /// Returns the number of queries so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    fn next_reply(&self) -> StoreReply {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or(StoreReply::Rows(Vec::new()))
        }
    }
}

#[async_trait]
impl RecordStore for ScriptedRecordStore {
    async fn find_by_entities(&self, entities: &EntitySet) -> Result<Vec<Record>> {
        self.queries.lock().unwrap().push(entities.clone());
        match self.next_reply() {
            StoreReply::Rows(rows) => Ok(rows),
            StoreReply::Fail(message) => Err(Error::store(message)),
            StoreReply::Hang => std::future::pending().await,
        }
    }
}

/// One scripted trigger reply.
#[derive(Debug, Clone)]
pub enum TriggerReply {
    /// Answer with this acknowledgement.
    Ack(Acknowledgement),
    /// Fail as if the service were unreachable.
    Unreachable,
    /// Never answer.
    Hang,
}

/// Scrape trigger with a fixed reply.
#[derive(Debug, Clone)]
pub struct ScriptedScrapeTrigger {
    reply: TriggerReply,
    calls: Arc<Mutex<Vec<EntitySet>>>,
}

impl ScriptedScrapeTrigger {
    /// Creates a trigger with a fixed reply.
    #[must_use]
    pub fn new(reply: TriggerReply) -> Self {
        Self {
            reply,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a trigger that declines with `message`.
    #[must_use]
    pub fn rejecting(message: Option<&str>) -> Self {
        Self::new(TriggerReply::Ack(Acknowledgement::rejected(
            message.map(str::to_string),
        )))
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
}

#[async_trait]
impl ScrapeTrigger for ScriptedScrapeTrigger {
    async fn start_scrape(&self, entities: &EntitySet) -> Result<Acknowledgement> {
        self.calls.lock().unwrap().push(entities.clone());
        match &self.reply {
            TriggerReply::Ack(ack) => Ok(ack.clone()),
            TriggerReply::Unreachable => Err(Error::trigger(
                pullup_flow::error::TRIGGER_FALLBACK_MESSAGE,
            )),
            TriggerReply::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{RecordFactory, entities};

    #[tokio::test]
    async fn last_reply_repeats() {
        let store = ScriptedRecordStore::new([
            StoreReply::Rows(Vec::new()),
            StoreReply::Rows(vec![RecordFactory::record("A")]),
        ]);
        let query = entities(&["A"]);

        assert!(store.find_by_entities(&query).await.unwrap().is_empty());
        assert_eq!(store.find_by_entities(&query).await.unwrap().len(), 1);
        assert_eq!(store.find_by_entities(&query).await.unwrap().len(), 1);
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn failure_reply_is_a_store_error() {
        let store = ScriptedRecordStore::new([StoreReply::Fail("down".into())]);
        let err = store.find_by_entities(&entities(&["A"])).await.unwrap_err();
        assert!(matches!(err, Error::StoreFailure { .. }));
    }
}
