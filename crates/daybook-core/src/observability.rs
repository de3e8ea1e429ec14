//! Observability infrastructure for daybook.
//!
//! Structured logging with consistent spans. The job runs once per trigger, so
//! every log line emitted during a run carries the report date and invocation id.

use std::fmt;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl LogFormat {
    /// Parses a format name; anything other than `json` selects pretty output.
    #[must_use]
    pub fn from_name(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at startup. Safe to call multiple times; subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `daybook_report=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one report invocation.
///
/// # Example
///
/// ```rust
/// use daybook_core::observability::report_span;
///
/// let span = report_span("run", "2024-03-01", "01HQ3Z8V6Y1J9K2M3N4P5Q6R7S");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn report_span(operation: &str, report_date: &str, invocation_id: &str) -> Span {
    tracing::info_span!(
        "report",
        op = operation,
        report_date = report_date,
        invocation_id = invocation_id,
    )
}

/// Wrapper that hides a value from `Debug` and `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    /// Wraps a sensitive value.
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Returns the wrapped value.
    pub const fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
