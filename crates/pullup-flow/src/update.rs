//! Updates streamed to the caller while an invocation runs.

use pullup_core::{EntitySet, InvocationId, RecordSet};

/// A non-terminal view of an invocation's progress.
///
/// The `Interim` update, when emitted, always precedes every `Progress`
/// update of the same invocation. Records in an update are the merged
/// snapshot at that point, not a delta.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileUpdate {
    /// Records that were already in the store, sent before the scrape is
    /// triggered.
    Interim {
        /// Invocation that produced this update.
        invocation_id: InvocationId,
        /// Records available right now.
        records: RecordSet,
        /// Entities about to be scraped.
        pending: EntitySet,
    },
    /// A poll resolved at least one more entity.
    Progress {
        /// Invocation that produced this update.
        invocation_id: InvocationId,
        /// The poll that produced this update (1-indexed; the final check
        /// is `budget + 1`).
        attempt: u32,
        /// Entities resolved by this poll.
        resolved: EntitySet,
        /// Merged records so far.
        records: RecordSet,
        /// Entities still pending.
        pending: EntitySet,
    },
}

impl ReconcileUpdate {
    /// Returns the invocation this update belongs to.
    #[must_use]
    pub const fn invocation_id(&self) -> InvocationId {
        match self {
            Self::Interim { invocation_id, .. } | Self::Progress { invocation_id, .. } => {
                *invocation_id
            }
        }
    }

    /// Returns the merged records carried by this update.
    #[must_use]
    pub const fn records(&self) -> &RecordSet {
        match self {
            Self::Interim { records, .. } | Self::Progress { records, .. } => records,
        }
    }

    /// Returns the entities still pending when this update was sent.
    #[must_use]
    pub const fn pending(&self) -> &EntitySet {
        match self {
            Self::Interim { pending, .. } | Self::Progress { pending, .. } => pending,
        }
    }

    /// Returns true for the interim update.
    #[must_use]
    pub const fn is_interim(&self) -> bool {
        matches!(self, Self::Interim { .. })
    }
}
