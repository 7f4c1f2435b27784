//! Reconciliation state machine.
//!
//! This module provides:
//! - [`ReconcileState`]: The states one invocation moves through
//! - [`ReconcileEvent`]: The inputs that drive transitions
//! - [`ReconcileState::on`]: The pure transition function
//!
//! ```text
//! ┌──────┐ start ┌────────────────┐ pending=∅  ┌───────────┐
//! │ IDLE │──────►│ CHECKING_STORE │───────────►│ SUCCEEDED │◄─────────────┐
//! └──────┘       └────────────────┘            └───────────┘              │
//!                        │ pending≠∅                 ▲                    │
//!                        ▼                           │ all resolved       │
//!                 ┌────────────┐ accepted ┌──────────┐ elapsed ┌──────────┴──┐
//!                 │ TRIGGERING │─────────►│ SETTLING │────────►│ POLLING(n)  │◄─┐
//!                 └────────────┘          └──────────┘         └─────────────┘  │
//!                        │ rejected                               │  │ n<budget │
//!                        ▼                                        │  └──────────┘
//!                  ┌────────┐   still missing  ┌────────────────┐ │ n=budget
//!                  │ FAILED │◄─────────────────│ FINAL_SETTLING │◄┘
//!                  └────────┘                  └────────────────┘
//! ```
//!
//! A store failure moves `CHECKING_STORE`, `POLLING(n)` or `FINAL_SETTLING`
//! to `FAILED`; cancellation moves any non-terminal state to `CANCELLED`.
//! Terminal states accept no events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// States of one reconciliation invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "state")]
pub enum ReconcileState {
    /// Created, not yet started.
    #[default]
    Idle,
    /// Looking up records that already exist.
    CheckingStore,
    /// Asking the trigger service to scrape the missing entities.
    Triggering,
    /// Waiting for the scrape job to produce anything visible.
    Settling,
    /// About to run poll number `attempt` (1-indexed).
    Polling {
        /// The poll about to run.
        attempt: u32,
    },
    /// Poll budget spent; waiting once more before the last re-check.
    FinalSettling,
    /// Every requested entity resolved.
    Succeeded,
    /// Terminal failure.
    Failed,
    /// Abandoned by the caller.
    Cancelled,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// `reconcile()` was called.
    Started,
    /// The initial store check finished.
    StoreChecked {
        /// Entities with no records yet.
        pending: usize,
    },
    /// The trigger service accepted the scrape job.
    TriggerAccepted,
    /// The trigger service rejected the job or was unreachable.
    TriggerRejected,
    /// The settle wait elapsed.
    SettleElapsed,
    /// A poll (or the final re-check) finished.
    Polled {
        /// Entities still without records after this poll.
        remaining: usize,
    },
    /// A store query failed.
    StoreFailed,
    /// The caller cancelled the invocation.
    Cancelled,
}

impl ReconcileState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the machine is waiting on the scrape job.
    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        matches!(
            self,
            Self::Settling | Self::Polling { .. } | Self::FinalSettling
        )
    }

    /// Applies an event and returns the next state.
    ///
    /// `poll_budget` is the number of polls allowed before escalating to
    /// the final settle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] when the event has no
    /// transition from the current state.
    pub fn on(self, event: ReconcileEvent, poll_budget: u32) -> Result<Self> {
        use ReconcileEvent as E;

        let next = match (self, event) {
            (s, _) if s.is_terminal() => None,
            (_, E::Cancelled) => Some(Self::Cancelled),
            (Self::Idle, E::Started) => Some(Self::CheckingStore),
            (
                Self::CheckingStore | Self::Polling { .. } | Self::FinalSettling,
                E::StoreFailed,
            ) => Some(Self::Failed),
            (Self::CheckingStore, E::StoreChecked { pending: 0 }) => Some(Self::Succeeded),
            (Self::CheckingStore, E::StoreChecked { .. }) => Some(Self::Triggering),
            (Self::Triggering, E::TriggerAccepted) => Some(Self::Settling),
            (Self::Triggering, E::TriggerRejected) => Some(Self::Failed),
            (Self::Settling, E::SettleElapsed) => Some(Self::Polling { attempt: 1 }),
            (Self::Polling { .. }, E::Polled { remaining: 0 }) => Some(Self::Succeeded),
            (Self::Polling { attempt }, E::Polled { .. }) if attempt < poll_budget => {
                Some(Self::Polling {
                    attempt: attempt + 1,
                })
            }
            (Self::Polling { .. }, E::Polled { .. }) => Some(Self::FinalSettling),
            (Self::FinalSettling, E::Polled { remaining: 0 }) => Some(Self::Succeeded),
            (Self::FinalSettling, E::Polled { .. }) => Some(Self::Failed),
            _ => None,
        };

        next.ok_or_else(|| Error::InvalidStateTransition {
            from: self.to_string(),
            event: format!("{event:?}"),
        })
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingStore => "checking_store",
            Self::Triggering => "triggering",
            Self::Settling => "settling",
            Self::Polling { .. } => "polling",
            Self::FinalSettling => "final_settling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::CheckingStore => write!(f, "CHECKING_STORE"),
            Self::Triggering => write!(f, "TRIGGERING"),
            Self::Settling => write!(f, "SETTLING"),
            Self::Polling { attempt } => write!(f, "POLLING({attempt})"),
            Self::FinalSettling => write!(f, "FINAL_SETTLING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}
