//! Observability infrastructure for pullup.
//!
//! Structured logging with consistent spans. This module provides the
//! logging initialisation helper and span constructors shared by every
//! pullup component.

use std::fmt;
use std::str::FromStr;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::id::InvocationId;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
    /// Single-line compact logs.
    Compact,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!(
                "unknown log format '{other}' (expected json, pretty or compact)"
            )),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops. Logs go to stderr so command output on
/// stdout stays machine-readable.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `pullup_flow=debug`)
///
/// # Example
///
/// ```rust
/// use pullup_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty, "info");
/// ```
pub fn init_logging(format: LogFormat, default_filter: &str) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        let result = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Compact => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt_layer::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        };
        // Another subscriber (e.g. a test harness) may already be installed.
        let _ = result;
    });
}

/// Creates the span that wraps one reconciliation invocation.
///
/// # Example
///
/// ```rust
/// use pullup_core::InvocationId;
/// use pullup_core::observability::reconcile_span;
///
/// let span = reconcile_span(&InvocationId::generate(), 3);
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn reconcile_span(invocation: &InvocationId, entity_count: usize) -> Span {
    tracing::info_span!(
        "reconcile",
        invocation = %invocation,
        entities = entity_count,
    )
}

/// Creates a span for a call to an external collaborator.
#[must_use]
pub fn collaborator_span(collaborator: &str, operation: &str) -> Span {
    tracing::debug_span!("collaborator", name = collaborator, op = operation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Compact, "warn");
        init_logging(LogFormat::Json, "warn");
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn spans_can_be_entered() {
        let span = reconcile_span(&InvocationId::generate(), 2);
        let _guard = span.enter();
        tracing::info!("inside reconcile span");
        let inner = collaborator_span("record_store", "find_by_entities");
        let _inner = inner.enter();
    }
}
