//! Pre-built fixtures for report scenarios.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use daybook_notify::RecordingNotifier;
use daybook_query::{InMemoryQueryEngine, ResultRow, ResultSet};

use crate::storage::TracingMemoryBackend;

/// Column header returned by the daily summary query.
pub const SUMMARY_COLUMNS: [&str; 3] = ["report_date", "total_events", "unique_event_types"];

/// Header row of the daily summary query.
pub fn summary_header() -> ResultRow {
    ResultRow::from_values(&SUMMARY_COLUMNS)
}

/// Summary results with a header and one data row.
pub fn summary_results(report_date: &str, total_events: &str, unique_event_types: &str) -> ResultSet {
    ResultSet::with_header(
        summary_header(),
        vec![ResultRow::from_values(&[
            report_date,
            total_events,
            unique_event_types,
        ])],
    )
}

/// Summary results containing only the header row.
pub fn header_only_results() -> ResultSet {
    ResultSet::with_header(summary_header(), Vec::new())
}

/// Parses an RFC 3339 timestamp for use as the job clock.
pub fn fixed_time(rfc3339: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(rfc3339).expect("valid RFC 3339 timestamp")
}

/// In-memory collaborators for a report run.
pub struct ReportHarness {
    /// Report destination.
    pub storage: Arc<TracingMemoryBackend>,
    /// Query engine returning fixed results.
    pub engine: Arc<InMemoryQueryEngine>,
    /// Notifier recording every message.
    pub notifier: Arc<RecordingNotifier>,
}

impl ReportHarness {
    /// Harness whose query succeeds immediately with `results`.
    pub fn new(results: ResultSet) -> Self {
        Self::with_engine(InMemoryQueryEngine::new(results))
    }

    /// Harness around a pre-configured engine.
    pub fn with_engine(engine: InMemoryQueryEngine) -> Self {
        Self {
            storage: Arc::new(TracingMemoryBackend::new()),
            engine: Arc::new(engine),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    /// Replaces the notifier with one that rejects every message.
    #[must_use]
    pub fn with_failing_notifier(mut self, message: &str) -> Self {
        self.notifier = Arc::new(RecordingNotifier::failing(message));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_results_have_header_and_row() {
        let results = summary_results("2024-03-01", "1532", "12");
        assert_eq!(results.header(), Some(&summary_header()));
        let row = results.first_data_row().expect("data row");
        assert_eq!(row.field(1), Some("1532"));
        assert!(header_only_results().first_data_row().is_none());
    }
}
