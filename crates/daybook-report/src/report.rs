//! Report request, query construction and the rendered report document.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone};
use serde::Serialize;

use daybook_query::{QuerySpec, ResultSet};

/// Key prefix under which reports are written.
pub const REPORT_PREFIX: &str = "reports/";

/// Value used for a count the query did not return.
pub const DEFAULT_COUNT: &str = "0";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The day a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportRequest {
    report_date: NaiveDate,
}

impl ReportRequest {
    /// Report for an explicit calendar date.
    #[must_use]
    pub const fn for_date(report_date: NaiveDate) -> Self {
        Self { report_date }
    }

    /// Report for the calendar date of `now` in its own timezone.
    #[must_use]
    pub fn from_now<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self::for_date(now.date_naive())
    }

    /// Parses a `YYYY-MM-DD` date.
    ///
    /// # Errors
    ///
    /// Returns the parse error for anything else.
    pub fn parse(date: &str) -> Result<Self, chrono::ParseError> {
        NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map(Self::for_date)
    }

    /// The covered date.
    #[must_use]
    pub const fn report_date(&self) -> NaiveDate {
        self.report_date
    }

    /// The covered date as `YYYY-MM-DD`.
    #[must_use]
    pub fn date_string(&self) -> String {
        self.report_date.format(DATE_FORMAT).to_string()
    }

    /// Object key the report is written to.
    #[must_use]
    pub fn report_key(&self) -> String {
        format!("{REPORT_PREFIX}daily_report_{}.txt", self.date_string())
    }
}

/// Where the summary query reads from and writes scratch results to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    /// Database holding the event table.
    pub database: String,
    /// Event table name.
    pub table: String,
    /// Scratch output URI for query results.
    pub output_location: String,
    /// Optional workgroup.
    pub workgroup: Option<String>,
}

impl QueryTarget {
    /// Builds the summary query for `request`.
    #[must_use]
    pub fn query_spec(&self, request: &ReportRequest) -> QuerySpec {
        QuerySpec {
            sql_text: summary_sql(&request.date_string(), &self.database, &self.table),
            database_name: self.database.clone(),
            output_location: self.output_location.clone(),
            workgroup: self.workgroup.clone(),
        }
    }
}

/// Daily summary aggregation for one date.
///
/// `date` is always produced by [`ReportRequest::date_string`]; identifiers are
/// validated when configuration is loaded.
#[must_use]
pub fn summary_sql(date: &str, database: &str, table: &str) -> String {
    format!(
        "SELECT\n  \
         '{date}' AS report_date,\n  \
         COUNT(*) AS total_events,\n  \
         COUNT(DISTINCT event_type) AS unique_event_types\n\
         FROM {database}.{table}\n\
         WHERE event_date = date('{date}')"
    )
}

/// The rendered unit that is persisted and emailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    /// Date reported by the query (or the requested date).
    pub report_date: String,
    /// Total event count.
    pub total_events: String,
    /// Distinct event type count.
    pub unique_event_types: String,
    /// When the report was produced.
    pub generated_at: DateTime<FixedOffset>,
}

impl ReportDocument {
    /// Derives the document from query results.
    ///
    /// The first data row is used; further rows are ignored. Missing rows or
    /// null cells fall back to the requested date and `"0"` counts.
    #[must_use]
    pub fn from_results(
        request: &ReportRequest,
        results: &ResultSet,
        generated_at: DateTime<FixedOffset>,
    ) -> Self {
        let row = results.first_data_row();
        let cell = |index: usize| row.and_then(|r| r.field(index)).map(str::to_string);

        Self {
            report_date: cell(0).unwrap_or_else(|| request.date_string()),
            total_events: cell(1).unwrap_or_else(|| DEFAULT_COUNT.to_string()),
            unique_event_types: cell(2).unwrap_or_else(|| DEFAULT_COUNT.to_string()),
            generated_at,
        }
    }

    /// Renders the plain-text report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "=== DAILY SUMMARY REPORT ===");
        let _ = writeln!(text, "Report Date: {}", self.report_date);
        let _ = writeln!(text, "Total Events: {}", self.total_events);
        let _ = writeln!(text, "Unique Event Types: {}", self.unique_event_types);
        let _ = writeln!(text);
        let _ = writeln!(
            text,
            "Generated at: {}",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, false)
        );
        text
    }

    /// Subject line for the notification email.
    #[must_use]
    pub fn email_subject(&self) -> String {
        format!("Daily Summary Report - {}", self.report_date)
    }
}
