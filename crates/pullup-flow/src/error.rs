//! Error types for the reconciliation domain.
//!
//! Every terminal failure of an invocation maps to exactly one variant here.
//! Failures that happen after records were already resolved carry those
//! records so callers can still display partial results next to the error.

use pullup_core::RecordSet;

/// The result type used throughout pullup-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Message surfaced when the scrape trigger gives no reason of its own.
pub const TRIGGER_FALLBACK_MESSAGE: &str =
    "Failed to initiate product scraping. Please try again.";

/// Errors that can occur during reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request was empty or malformed; rejected before any network call.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what is wrong with the request.
        message: String,
    },

    /// The scrape trigger rejected the job or could not be reached.
    #[error("{message}")]
    TriggerFailure {
        /// Message from the trigger service, or a generic fallback.
        message: String,
        /// Records already resolved from the store before triggering.
        partial: RecordSet,
    },

    /// The record store query itself failed (not "zero rows").
    #[error("record store error: {message}")]
    StoreFailure {
        /// Description of the store failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The poll budget and final settle ran out with entities still missing.
    #[error("data not available after scraping for: {}", .unresolved.join(", "))]
    UnavailableAfterScrape {
        /// Display names of the entities that never appeared.
        unresolved: Vec<String>,
        /// Records that were resolved.
        partial: RecordSet,
    },

    /// The invocation was cancelled before reaching a terminal outcome.
    #[error("reconciliation cancelled")]
    Cancelled {
        /// Records resolved before cancellation.
        partial: RecordSet,
    },

    /// Configuration was missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An invalid state machine transition was attempted.
    #[error("invalid state transition: {from} on {event}")]
    InvalidStateTransition {
        /// The state the machine was in.
        from: String,
        /// The event that had no transition.
        event: String,
    },

    /// An error from pullup-core.
    #[error(transparent)]
    Core(#[from] pullup_core::error::Error),
}

impl Error {
    /// Creates an invalid-request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a trigger failure with no partial records attached.
    #[must_use]
    pub fn trigger(message: impl Into<String>) -> Self {
        Self::TriggerFailure {
            message: message.into(),
            partial: RecordSet::new(),
        }
    }

    /// Creates a new store error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new store error with a source.
    #[must_use]
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StoreFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the records resolved before the failure, if the variant
    /// carries any.
    #[must_use]
    pub fn partial_records(&self) -> Option<&RecordSet> {
        match self {
            Self::TriggerFailure { partial, .. }
            | Self::UnavailableAfterScrape { partial, .. }
            | Self::Cancelled { partial } => Some(partial),
            _ => None,
        }
    }

    /// Returns a short label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } | Self::Core(_) => "invalid_request",
            Self::TriggerFailure { .. } => "trigger_failure",
            Self::StoreFailure { .. } => "store_failure",
            Self::UnavailableAfterScrape { .. } => "unavailable_after_scrape",
            Self::Cancelled { .. } => "cancelled",
            Self::Configuration { .. } => "configuration",
            Self::InvalidStateTransition { .. } => "invalid_transition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pullup_core::Record;
    use std::error::Error as StdError;

    #[test]
    fn trigger_failure_surfaces_message_verbatim() {
        let err = Error::trigger("Invalid company name \"X!\"");
        assert_eq!(err.to_string(), "Invalid company name \"X!\"");
    }

    #[test]
    fn unavailable_lists_entities() {
        let err = Error::UnavailableAfterScrape {
            unresolved: vec!["Apple".into(), "Google".into()],
            partial: RecordSet::new(),
        };
        assert_eq!(
            err.to_string(),
            "data not available after scraping for: Apple, Google"
        );
    }

    #[test]
    fn partial_records_are_exposed() {
        let partial: RecordSet = vec![Record::new("A", "p", 1.0, 1.0, 1).unwrap()].into();
        let err = Error::UnavailableAfterScrape {
            unresolved: vec!["B".into()],
            partial,
        };
        assert_eq!(err.partial_records().map(RecordSet::len), Some(1));
        assert!(Error::store("boom").partial_records().is_none());
    }

    #[test]
    fn store_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::store_with_source("query failed", source);
        assert!(err.to_string().contains("record store error"));
        assert!(StdError::source(&err).is_some());
        assert_eq!(err.as_label(), "store_failure");
    }
}
