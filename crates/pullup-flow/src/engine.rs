//! The reconciliation engine.
//!
//! [`ReconciliationEngine::reconcile`] takes a set of entities and returns
//! their records, triggering a scrape for whatever the store does not have
//! yet and polling until it shows up:
//!
//! 1. Query the store for every requested entity.
//! 2. If nothing is missing, return immediately. No trigger, no waits.
//! 3. Otherwise emit the available records as an interim update, then
//!    trigger one scrape for the missing entities only.
//! 4. Wait the settle wait, then poll the store for the still-missing
//!    entities, up to the poll budget, `poll_interval` apart.
//! 5. If the budget runs out, wait the final settle wait and check once more.
//! 6. Succeed when nothing is missing; otherwise fail with
//!    [`Error::UnavailableAfterScrape`] carrying the records that did
//!    resolve.
//!
//! Every wait and every collaborator call races the invocation's
//! [`CancellationToken`], and collaborator calls are bounded by the
//! configured call timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use pullup_core::observability::{collaborator_span, reconcile_span};
use pullup_core::{EntitySet, InvocationId, Record, RecordSet};

use crate::config::ReconcileConfig;
use crate::context::{ReconcileContext, ReconcileRequest};
use crate::error::{Error, Result, TRIGGER_FALLBACK_MESSAGE};
use crate::metrics::{ReconcileMetrics, TimingGuard};
use crate::policy::PollPolicy;
use crate::session::ReconcileHandle;
use crate::state::{ReconcileEvent, ReconcileState};
use crate::store::RecordStore;
use crate::trigger::ScrapeTrigger;
use crate::update::ReconcileUpdate;

/// Drives reconciliation invocations against a record store and a scrape
/// trigger.
///
/// The engine holds no per-invocation state; clones share collaborators and
/// any number of invocations may run concurrently.
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn RecordStore>,
    trigger: Arc<dyn ScrapeTrigger>,
    config: ReconcileConfig,
    policy: PollPolicy,
    metrics: ReconcileMetrics,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn new(
        store: Arc<dyn RecordStore>,
        trigger: Arc<dyn ScrapeTrigger>,
        config: ReconcileConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            trigger,
            policy: PollPolicy::from(&config),
            config,
            metrics: ReconcileMetrics::new(),
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Returns the poll schedule derived from the configuration.
    #[must_use]
    pub const fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Reconciles `entities` and returns their merged records.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `entities` is empty
    /// - [`Error::StoreFailure`] if any store query fails
    /// - [`Error::TriggerFailure`] if the scrape cannot be started
    /// - [`Error::UnavailableAfterScrape`] if entities are still missing
    ///   after the final check
    pub async fn reconcile(&self, entities: &EntitySet) -> Result<RecordSet> {
        self.reconcile_with(entities, None, CancellationToken::new())
            .await
    }

    /// Reconciles `entities`, streaming updates and honouring `cancel`.
    ///
    /// Updates go to `updates` if given; a closed receiver is ignored.
    ///
    /// # Errors
    ///
    /// As [`reconcile`](Self::reconcile), plus [`Error::Cancelled`] when
    /// `cancel` fires before a terminal outcome.
    pub async fn reconcile_with(
        &self,
        entities: &EntitySet,
        updates: Option<&UnboundedSender<ReconcileUpdate>>,
        cancel: CancellationToken,
    ) -> Result<RecordSet> {
        self.invoke(InvocationId::generate(), entities, updates, &cancel)
            .await
    }

    /// Starts an invocation on the current Tokio runtime.
    ///
    /// Dropping the returned handle cancels the invocation.
    #[must_use]
    pub fn spawn(&self, entities: EntitySet) -> ReconcileHandle {
        self.spawn_sequenced(entities, 0)
    }

    pub(crate) fn spawn_sequenced(&self, entities: EntitySet, sequence: u64) -> ReconcileHandle {
        let invocation_id = InvocationId::generate();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let engine = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            engine
                .invoke(invocation_id, &entities, Some(&tx), &token)
                .await
        });

        ReconcileHandle::new(invocation_id, sequence, rx, cancel, task)
    }

    async fn invoke(
        &self,
        invocation_id: InvocationId,
        entities: &EntitySet,
        updates: Option<&UnboundedSender<ReconcileUpdate>>,
        cancel: &CancellationToken,
    ) -> Result<RecordSet> {
        let started = Instant::now();
        let outcome = match ReconcileRequest::new(entities.clone()) {
            Ok(request) => {
                let span = reconcile_span(&invocation_id, request.len());
                self.execute(invocation_id, request, updates, cancel)
                    .instrument(span)
                    .await
            }
            Err(error) => Err(error),
        };

        let label = match &outcome {
            Ok(_) => "succeeded",
            Err(error) => error.as_label(),
        };
        self.metrics.record_outcome(label, started.elapsed());
        match &outcome {
            Ok(records) => tracing::info!(
                invocation = %invocation_id,
                records = records.len(),
                "reconciliation succeeded"
            ),
            Err(error) => tracing::warn!(
                invocation = %invocation_id,
                outcome = label,
                %error,
                "reconciliation failed"
            ),
        }
        outcome
    }

    async fn execute(
        &self,
        invocation_id: InvocationId,
        request: ReconcileRequest,
        updates: Option<&UnboundedSender<ReconcileUpdate>>,
        cancel: &CancellationToken,
    ) -> Result<RecordSet> {
        let _active = self.metrics.track_invocation();
        let mut ctx = ReconcileContext::new(invocation_id, request, self.policy.budget());
        self.run(&mut ctx, updates, cancel).await?;
        Ok(ctx.into_records())
    }

    async fn run(
        &self,
        ctx: &mut ReconcileContext,
        updates: Option<&UnboundedSender<ReconcileUpdate>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.step(ctx, ReconcileEvent::Started)?;

        while !ctx.state().is_terminal() {
            let event = match self.advance(ctx, updates, cancel).await {
                Ok(event) => event,
                Err(error) => return Err(self.abort(ctx, error)),
            };
            self.step(ctx, event)?;
        }

        if ctx.state() == ReconcileState::Succeeded {
            Ok(())
        } else {
            Err(Error::UnavailableAfterScrape {
                unresolved: ctx.unresolved_names(),
                partial: ctx.records().clone(),
            })
        }
    }

    /// Performs the work of the current state and returns the event it
    /// produced.
    async fn advance(
        &self,
        ctx: &mut ReconcileContext,
        updates: Option<&UnboundedSender<ReconcileUpdate>>,
        cancel: &CancellationToken,
    ) -> Result<ReconcileEvent> {
        let state = ctx.state();
        match state {
            ReconcileState::CheckingStore => {
                let queried = ctx.request().entities().clone();
                let rows = self.query_store(&queried, "initial", cancel).await?;
                ctx.absorb(&queried, rows);
                tracing::info!(
                    available = ctx.available().len(),
                    pending = ctx.pending().len(),
                    "initial store check finished"
                );
                Ok(ReconcileEvent::StoreChecked {
                    pending: ctx.pending().len(),
                })
            }
            ReconcileState::Triggering => {
                send(
                    updates,
                    ReconcileUpdate::Interim {
                        invocation_id: ctx.invocation_id(),
                        records: ctx.records().clone(),
                        pending: ctx.pending().clone(),
                    },
                );
                self.start_scrape(ctx.pending(), cancel).await?;
                Ok(ReconcileEvent::TriggerAccepted)
            }
            ReconcileState::Settling => {
                wait(self.policy.delay_for(state), cancel).await?;
                Ok(ReconcileEvent::SettleElapsed)
            }
            ReconcileState::Polling { .. } | ReconcileState::FinalSettling => {
                wait(self.policy.delay_for(state), cancel).await?;
                ctx.record_poll();
                self.metrics.record_poll_attempt();
                let attempt = ctx.polls();
                let phase = if state == ReconcileState::FinalSettling {
                    "final"
                } else {
                    "poll"
                };

                let queried = ctx.pending().clone();
                let rows = self.query_store(&queried, phase, cancel).await?;
                let resolved = ctx.absorb(&queried, rows);
                tracing::debug!(
                    attempt,
                    phase,
                    resolved = resolved.len(),
                    remaining = ctx.pending().len(),
                    "poll finished"
                );

                if !resolved.is_empty() {
                    send(
                        updates,
                        ReconcileUpdate::Progress {
                            invocation_id: ctx.invocation_id(),
                            attempt,
                            resolved,
                            records: ctx.records().clone(),
                            pending: ctx.pending().clone(),
                        },
                    );
                }
                Ok(ReconcileEvent::Polled {
                    remaining: ctx.pending().len(),
                })
            }
            other => Err(Error::InvalidStateTransition {
                from: other.to_string(),
                event: "advance".to_string(),
            }),
        }
    }

    fn step(&self, ctx: &mut ReconcileContext, event: ReconcileEvent) -> Result<()> {
        let (from, to) = ctx.apply(event)?;
        self.metrics
            .record_transition(from.as_label(), to.as_label());
        tracing::info!(%from, %to, "state transition");
        Ok(())
    }

    /// Moves the machine to its failure state for `error` and attaches the
    /// records resolved so far.
    fn abort(&self, ctx: &mut ReconcileContext, error: Error) -> Error {
        let event = match (&error, ctx.state()) {
            (Error::Cancelled { .. }, _) => ReconcileEvent::Cancelled,
            (_, ReconcileState::Triggering) => ReconcileEvent::TriggerRejected,
            _ => ReconcileEvent::StoreFailed,
        };
        if let Err(transition) = self.step(ctx, event) {
            return transition;
        }

        let partial = ctx.records().clone();
        match error {
            Error::TriggerFailure { message, .. } => Error::TriggerFailure { message, partial },
            Error::Cancelled { .. } => Error::Cancelled { partial },
            other => other,
        }
    }

    async fn query_store(
        &self,
        queried: &EntitySet,
        phase: &'static str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        let _timer = TimingGuard::new(|elapsed| {
            tracing::debug!(?elapsed, phase, "store query latency");
        });
        let timeout = self.config.call_timeout;
        let outcome = self
            .guarded(cancel, self.store.find_by_entities(queried), || {
                Error::store(format!("record store query timed out after {timeout:?}"))
            })
            .instrument(collaborator_span("record_store", "find_by_entities"))
            .await;

        match outcome {
            Ok(rows) => {
                self.metrics.record_store_query(phase, "ok");
                Ok(rows)
            }
            Err(error @ Error::Cancelled { .. }) => Err(error),
            Err(error @ Error::StoreFailure { .. }) => {
                self.metrics.record_store_query(phase, "error");
                Err(error)
            }
            Err(other) => {
                self.metrics.record_store_query(phase, "error");
                Err(Error::store_with_source("record store query failed", other))
            }
        }
    }

    async fn start_scrape(&self, pending: &EntitySet, cancel: &CancellationToken) -> Result<()> {
        let timeout = self.config.call_timeout;
        let outcome = self
            .guarded(cancel, self.trigger.start_scrape(pending), || {
                tracing::warn!(?timeout, "scrape trigger timed out");
                Error::trigger(TRIGGER_FALLBACK_MESSAGE)
            })
            .instrument(collaborator_span("scrape_trigger", "start_scrape"))
            .await;

        let ack = match outcome {
            Ok(ack) => ack,
            Err(error @ Error::Cancelled { .. }) => return Err(error),
            Err(error @ Error::TriggerFailure { .. }) => {
                self.metrics.record_trigger_call("error");
                return Err(error);
            }
            Err(other) => {
                self.metrics.record_trigger_call("error");
                return Err(Error::trigger(other.to_string()));
            }
        };

        if !ack.accepted {
            self.metrics.record_trigger_call("rejected");
            let message = ack
                .message
                .unwrap_or_else(|| TRIGGER_FALLBACK_MESSAGE.to_string());
            return Err(Error::trigger(message));
        }

        self.metrics.record_trigger_call("accepted");
        let unaccepted = ack.unaccepted(pending);
        if !unaccepted.is_empty() {
            tracing::warn!(
                entities = %unaccepted,
                "scrape not started for every entity; they stay pending"
            );
        }
        tracing::info!(
            entities = %pending,
            status = ack.message.as_deref().unwrap_or_default(),
            "scrape triggered"
        );
        Ok(())
    }

    /// Runs a collaborator call bounded by the call timeout and raced
    /// against cancellation.
    async fn guarded<T, F>(
        &self,
        cancel: &CancellationToken,
        call: F,
        on_timeout: impl FnOnce() -> Error,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(cancelled()),
            outcome = tokio::time::timeout(self.config.call_timeout, call) => {
                outcome.unwrap_or_else(|_| Err(on_timeout()))
            }
        }
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
async fn wait(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(cancelled())
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(cancelled()),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

fn cancelled() -> Error {
    Error::Cancelled {
        partial: RecordSet::new(),
    }
}

fn send(updates: Option<&UnboundedSender<ReconcileUpdate>>, update: ReconcileUpdate) {
    if let Some(tx) = updates {
        if tx.send(update).is_err() {
            tracing::debug!("update receiver dropped");
        }
    }
}
