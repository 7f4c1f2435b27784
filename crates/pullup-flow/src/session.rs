//! Spawned invocations and caller sessions.
//!
//! A [`ReconcileHandle`] owns one spawned invocation: its update stream,
//! its cancellation token and its result. Dropping the handle cancels the
//! invocation so abandoned work stops polling.
//!
//! A [`ReconcileSession`] numbers the invocations one caller starts. A new
//! invocation does not cancel older ones; the caller asks
//! [`ReconcileSession::is_current`] before showing a result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use pullup_core::{EntitySet, InvocationId, RecordSet};

use crate::engine::ReconciliationEngine;
use crate::error::{Error, Result};
use crate::update::ReconcileUpdate;

/// Handle to a spawned invocation.
#[derive(Debug)]
pub struct ReconcileHandle {
    invocation_id: InvocationId,
    sequence: u64,
    updates: UnboundedReceiver<ReconcileUpdate>,
    cancel: CancellationToken,
    task: JoinHandle<Result<RecordSet>>,
    _guard: DropGuard,
}

impl ReconcileHandle {
    pub(crate) fn new(
        invocation_id: InvocationId,
        sequence: u64,
        updates: UnboundedReceiver<ReconcileUpdate>,
        cancel: CancellationToken,
        task: JoinHandle<Result<RecordSet>>,
    ) -> Self {
        let guard = cancel.clone().drop_guard();
        Self {
            invocation_id,
            sequence,
            updates,
            cancel,
            task,
            _guard: guard,
        }
    }

    /// Returns the invocation ID.
    #[must_use]
    pub const fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Returns the session sequence number (0 outside a session).
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Requests cancellation. The result becomes [`Error::Cancelled`] unless
    /// the invocation already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a clone of the invocation's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receives the next update.
    ///
    /// Returns `None` once the invocation has finished and every update has
    /// been received.
    pub async fn next_update(&mut self) -> Option<ReconcileUpdate> {
        self.updates.recv().await
    }

    /// Waits for the terminal outcome.
    ///
    /// Updates not yet received are discarded.
    ///
    /// # Errors
    ///
    /// Returns the invocation's error, or [`Error::Cancelled`] if the task
    /// was aborted.
    pub async fn join(self) -> Result<RecordSet> {
        let Self { task, _guard, .. } = self;
        match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled {
                partial: RecordSet::new(),
            }),
        }
    }
}

/// Numbers the invocations started by one caller.
///
/// Cloning a session shares its counter.
#[derive(Debug, Clone)]
pub struct ReconcileSession {
    engine: ReconciliationEngine,
    latest: Arc<AtomicU64>,
}

impl ReconcileSession {
    /// Creates a session over `engine`.
    #[must_use]
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self {
            engine,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts a new invocation, superseding (not cancelling) earlier ones.
    #[must_use]
    pub fn start(&self, entities: EntitySet) -> ReconcileHandle {
        let sequence = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(sequence, "starting session invocation");
        self.engine.spawn_sequenced(entities, sequence)
    }

    /// Returns true if `sequence` belongs to the most recent invocation.
    #[must_use]
    pub fn is_current(&self, sequence: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == sequence
    }

    /// Returns the most recent sequence number (0 before the first start).
    #[must_use]
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
