//! Invocation contract: event in, `{statusCode, body}` out.
//!
//! The event may carry `"report_date": "YYYY-MM-DD"` to re-run one specific day;
//! everything else in it is ignored. The body is a JSON string, mirroring the
//! shape schedulers and function runtimes expect.

use std::panic::AssertUnwindSafe;

use chrono::{DateTime, FixedOffset};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::job::{JobError, JobOutcome, ReportJob};
use crate::report::ReportRequest;

/// Message carried by every success body.
pub const SUCCESS_MESSAGE: &str = "Report generated successfully";

/// Recognised event fields.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InvocationEvent {
    /// Explicit date to report on.
    pub report_date: Option<String>,
}

impl InvocationEvent {
    /// Extracts the recognised fields; non-object events count as empty.
    #[must_use]
    pub fn from_value(event: &Value) -> Self {
        match event.get("report_date") {
            Some(Value::String(date)) => Self {
                report_date: Some(date.clone()),
            },
            _ => Self::default(),
        }
    }
}

/// `{statusCode, body}` returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    /// 200 on success, 500 on failure.
    pub status_code: u16,
    /// JSON-encoded body.
    pub body: String,
}

#[derive(Serialize)]
struct SuccessBody<'a> {
    message: &'static str,
    report_key: &'a str,
    report_date: &'a str,
    event_count: &'a str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl From<&JobOutcome> for InvocationResponse {
    fn from(outcome: &JobOutcome) -> Self {
        let (status_code, body) = match outcome {
            JobOutcome::Success {
                report_key,
                report_date,
                event_count,
            } => (
                200,
                serde_json::to_string(&SuccessBody {
                    message: SUCCESS_MESSAGE,
                    report_key,
                    report_date,
                    event_count,
                }),
            ),
            JobOutcome::Failure { error_message } => (
                500,
                serde_json::to_string(&ErrorBody {
                    error: error_message,
                }),
            ),
        };

        Self {
            status_code,
            body: body.unwrap_or_else(|e| format!(r#"{{"error":"unencodable response: {e}"}}"#)),
        }
    }
}

impl InvocationResponse {
    /// True when the status code is 200.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Handles one invocation.
///
/// Never fails: every error, including a panic inside the job, is reported as a
/// 500 response.
pub async fn handle(job: &ReportJob, event: &Value, now: DateTime<FixedOffset>) -> InvocationResponse {
    let outcome = match InvocationEvent::from_value(event).report_date {
        Some(date) => match ReportRequest::parse(&date) {
            Ok(request) => run_guarded(job.run_for(request, now)).await,
            Err(e) => {
                tracing::warn!(report_date = %date, error = %e, "rejecting invocation");
                JobOutcome::failure(&JobError::Unknown(format!(
                    "invalid report_date {date:?}: expected YYYY-MM-DD ({e})"
                )))
            }
        },
        None => run_guarded(job.run(now)).await,
    };

    InvocationResponse::from(&outcome)
}

async fn run_guarded(run: impl Future<Output = JobOutcome>) -> JobOutcome {
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(detail = %detail, "report run panicked");
            JobOutcome::failure(&JobError::Unknown(format!("report run panicked: {detail}")))
        }
    }
}
