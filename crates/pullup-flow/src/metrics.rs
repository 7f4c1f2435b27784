//! Observability metrics for reconciliation.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `pullup_reconcile_invocations_total` | Counter | `outcome` | Terminal outcomes |
//! | `pullup_reconcile_transitions_total` | Counter | `from_state`, `to_state` | State transitions |
//! | `pullup_reconcile_duration_seconds` | Histogram | `outcome` | Wall time per invocation |
//! | `pullup_store_queries_total` | Counter | `phase`, `result` | Record store queries |
//! | `pullup_trigger_calls_total` | Counter | `result` | Scrape trigger calls |
//! | `pullup_poll_attempts_total` | Counter | - | Polls made after a trigger |
//! | `pullup_reconcile_active` | Gauge | - | Invocations in flight |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pullup_flow::metrics::ReconcileMetrics;
//!
//! let metrics = ReconcileMetrics::new();
//! metrics.record_transition("checking_store", "triggering");
//! metrics.record_trigger_call("accepted");
//! ```
//!
//! Metrics go through the `metrics` crate facade; without an installed
//! recorder every call is a no-op.

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Terminal outcomes of reconcile invocations.
    pub const INVOCATIONS_TOTAL: &str = "pullup_reconcile_invocations_total";
    /// Counter: State machine transitions.
    pub const TRANSITIONS_TOTAL: &str = "pullup_reconcile_transitions_total";
    /// Histogram: Invocation wall time in seconds.
    pub const DURATION_SECONDS: &str = "pullup_reconcile_duration_seconds";
    /// Counter: Record store queries.
    pub const STORE_QUERIES_TOTAL: &str = "pullup_store_queries_total";
    /// Counter: Scrape trigger calls.
    pub const TRIGGER_CALLS_TOTAL: &str = "pullup_trigger_calls_total";
    /// Counter: Polls after a trigger.
    pub const POLL_ATTEMPTS_TOTAL: &str = "pullup_poll_attempts_total";
    /// Gauge: Invocations currently running.
    pub const ACTIVE: &str = "pullup_reconcile_active";
}

/// Label keys used across metrics.
pub mod labels {
    /// Terminal outcome (succeeded, `trigger_failure`, ...).
    pub const OUTCOME: &str = "outcome";
    /// Previous state (for transitions).
    pub const FROM_STATE: &str = "from_state";
    /// Target state (for transitions).
    pub const TO_STATE: &str = "to_state";
    /// Workflow phase of a store query (initial, poll, final).
    pub const PHASE: &str = "phase";
    /// Result status (ok, error, accepted, rejected).
    pub const RESULT: &str = "result";
}

/// High-level interface for recording reconciliation metrics.
///
/// Cheap to clone and share across invocations.
#[derive(Debug, Clone, Default)]
pub struct ReconcileMetrics {
    _private: (),
}

impl ReconcileMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a state transition.
    pub fn record_transition(&self, from_state: &str, to_state: &str) {
        counter!(
            names::TRANSITIONS_TOTAL,
            labels::FROM_STATE => from_state.to_string(),
            labels::TO_STATE => to_state.to_string(),
        )
        .increment(1);
    }

    /// Records a terminal outcome and its duration.
    pub fn record_outcome(&self, outcome: &str, duration: Duration) {
        counter!(
            names::INVOCATIONS_TOTAL,
            labels::OUTCOME => outcome.to_string(),
        )
        .increment(1);
        histogram!(
            names::DURATION_SECONDS,
            labels::OUTCOME => outcome.to_string(),
        )
        .record(duration.as_secs_f64());
    }

    /// Records a record store query.
    pub fn record_store_query(&self, phase: &str, result: &str) {
        counter!(
            names::STORE_QUERIES_TOTAL,
            labels::PHASE => phase.to_string(),
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records a scrape trigger call.
    pub fn record_trigger_call(&self, result: &str) {
        counter!(
            names::TRIGGER_CALLS_TOTAL,
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records one poll after a trigger.
    pub fn record_poll_attempt(&self) {
        counter!(names::POLL_ATTEMPTS_TOTAL).increment(1);
    }

    /// Counts an invocation as in flight until the returned guard drops.
    ///
    /// The gauge is decremented even when the invocation future is dropped
    /// before completing.
    #[must_use = "the invocation stops counting as active when the guard drops"]
    pub fn track_invocation(&self) -> ActiveInvocation {
        gauge!(names::ACTIVE).increment(1.0);
        ActiveInvocation { _private: () }
    }
}

/// RAII guard for the in-flight gauge, returned by
/// [`ReconcileMetrics::track_invocation`].
#[derive(Debug)]
pub struct ActiveInvocation {
    _private: (),
}

impl Drop for ActiveInvocation {
    fn drop(&mut self) {
        gauge!(names::ACTIVE).decrement(1.0);
    }
}

/// RAII guard for timing operations.
///
/// Calls `on_drop` with the elapsed time when dropped.
///
/// ## Example
///
/// ```rust,no_run
/// use pullup_flow::metrics::TimingGuard;
///
/// {
///     let _guard = TimingGuard::new(|elapsed| {
///         tracing::debug!(?elapsed, "store query finished");
///     });
///     // Do work...
/// }
/// ```
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard that will call `on_drop` with the elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        let metrics = ReconcileMetrics::new();
        metrics.record_transition("idle", "checking_store");
        metrics.record_store_query("initial", "ok");
        metrics.record_trigger_call("accepted");
        metrics.record_poll_attempt();
        drop(metrics.track_invocation());
        metrics.record_outcome("succeeded", Duration::from_millis(3));
    }

    #[test]
    fn timing_guard_reports_on_drop() {
        let mut recorded = None;
        {
            let _guard = TimingGuard::new(|d| recorded = Some(d));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(recorded.is_some_and(|d| d >= Duration::from_millis(5)));
    }
}
