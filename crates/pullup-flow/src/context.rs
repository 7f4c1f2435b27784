//! Per-invocation request and working state.
//!
//! A [`ReconcileRequest`] is the immutable set of entities one invocation
//! works on. A [`ReconcileContext`] owns everything that changes while the
//! invocation runs: the available/pending partition, the merged records,
//! the current state and the poll counter. Nothing here is shared between
//! invocations.

use std::fmt;

use pullup_core::{EntitySet, InvocationId, Record, RecordSet};

use crate::error::{Error, Result};
use crate::state::{ReconcileEvent, ReconcileState};

/// The entities requested by one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    entities: EntitySet,
}

impl ReconcileRequest {
    /// Creates a request from an already-validated entity set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the set is empty.
    pub fn new(entities: EntitySet) -> Result<Self> {
        if entities.is_empty() {
            return Err(Error::invalid_request("at least one company is required"));
        }
        Ok(Self { entities })
    }

    /// Parses and validates raw company names into a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if any name is malformed or no
    /// non-blank name was supplied.
    pub fn parse<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entities =
            EntitySet::parse(names).map_err(|e| Error::invalid_request(e.to_string()))?;
        Self::new(entities)
    }

    /// Returns the requested entities.
    #[must_use]
    pub const fn entities(&self) -> &EntitySet {
        &self.entities
    }

    /// Returns the number of requested entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Always false; requests are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entities)
    }
}

/// Working state of one in-flight invocation.
#[derive(Debug)]
pub struct ReconcileContext {
    invocation_id: InvocationId,
    request: ReconcileRequest,
    available: EntitySet,
    pending: EntitySet,
    records: RecordSet,
    state: ReconcileState,
    poll_budget: u32,
    polls: u32,
}

impl ReconcileContext {
    /// Creates a fresh context in `IDLE` with every entity pending.
    #[must_use]
    pub fn new(invocation_id: InvocationId, request: ReconcileRequest, poll_budget: u32) -> Self {
        let pending = request.entities().clone();
        Self {
            invocation_id,
            request,
            available: EntitySet::new(),
            pending,
            records: RecordSet::new(),
            state: ReconcileState::Idle,
            poll_budget,
            polls: 0,
        }
    }

    /// Returns the invocation this context belongs to.
    #[must_use]
    pub const fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Returns the request.
    #[must_use]
    pub const fn request(&self) -> &ReconcileRequest {
        &self.request
    }

    /// Returns the entities that have records.
    #[must_use]
    pub const fn available(&self) -> &EntitySet {
        &self.available
    }

    /// Returns the entities still waiting for records.
    #[must_use]
    pub const fn pending(&self) -> &EntitySet {
        &self.pending
    }

    /// Returns the merged records resolved so far.
    #[must_use]
    pub const fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ReconcileState {
        self.state
    }

    /// Returns the number of store polls made after the trigger, including
    /// the final check.
    #[must_use]
    pub const fn polls(&self) -> u32 {
        self.polls
    }

    /// Applies an event to the state machine.
    ///
    /// Returns the `(from, to)` pair on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] if the event is not valid in
    /// the current state; the state is left unchanged.
    pub fn apply(&mut self, event: ReconcileEvent) -> Result<(ReconcileState, ReconcileState)> {
        let from = self.state;
        let to = from.on(event, self.poll_budget)?;
        self.state = to;
        debug_assert!(self.partition_holds(), "available/pending partition broken");
        Ok((from, to))
    }

    /// Merges a store response for `queried` into the context.
    ///
    /// Rows for entities outside `queried` are ignored. Every queried
    /// entity that has at least one row moves from pending to available,
    /// and its rows supersede any earlier rows for that entity.
    ///
    /// Returns the entities that became available with this call.
    pub fn absorb(&mut self, queried: &EntitySet, rows: Vec<Record>) -> EntitySet {
        let snapshot: RecordSet = rows
            .into_iter()
            .filter(|r| queried.contains_key(&r.entity_key()))
            .collect();

        let mut resolved = EntitySet::new();
        for entity in &snapshot.entities() {
            if let Some(requested) = self.pending.remove(entity.key()) {
                resolved.insert(requested.clone());
                self.available.insert(requested);
            }
        }

        self.records.supersede(snapshot);
        debug_assert!(self.partition_holds(), "available/pending partition broken");
        resolved
    }

    /// Counts one store poll.
    pub fn record_poll(&mut self) {
        self.polls = self.polls.saturating_add(1);
    }

    /// Returns true if available and pending are disjoint and together
    /// cover the request exactly.
    #[must_use]
    pub fn partition_holds(&self) -> bool {
        self.available.is_disjoint(&self.pending)
            && self.available.len() + self.pending.len() == self.request.len()
            && self
                .request
                .entities()
                .iter()
                .all(|e| self.available.contains(e) || self.pending.contains(e))
    }

    /// Returns the display names of pending entities.
    #[must_use]
    pub fn unresolved_names(&self) -> Vec<String> {
        self.pending.names()
    }

    /// Consumes the context and returns the merged records.
    #[must_use]
    pub fn into_records(self) -> RecordSet {
        self.records
    }
}
