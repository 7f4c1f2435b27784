//! Error types and result aliases for pullup primitives.

/// The result type used throughout pullup-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing core primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An entity name failed validation.
    #[error("invalid company name \"{name}\": {reason}")]
    InvalidEntity {
        /// The name as supplied by the caller.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// A record carried out-of-range or malformed values.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },
}

impl Error {
    /// Creates an invalid-entity error.
    #[must_use]
    pub fn invalid_entity(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-record error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_entity_display_names_the_input() {
        let err = Error::invalid_entity("Acme$", "contains invalid characters");
        let msg = err.to_string();
        assert!(msg.contains("Acme$"));
        assert!(msg.contains("invalid characters"));
    }

    #[test]
    fn invalid_record_display() {
        let err = Error::invalid_record("rating 7 is outside 0..=5");
        assert!(err.to_string().starts_with("invalid record"));
    }
}
