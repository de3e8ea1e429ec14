//! The report job: query, render, persist, notify.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use tracing::Instrument;
use ulid::Ulid;

use daybook_core::observability::report_span;
use daybook_core::{PutOptions, StorageBackend};
use daybook_notify::{EmailMessage, Notifier};
use daybook_query::{QueryEngine, WaitError, WaitPolicy, wait_for_success};

use crate::config::EmailRoute;
use crate::metrics::{RunTimer, record_notification};
use crate::report::{QueryTarget, ReportDocument, ReportRequest};

/// Why a run failed.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The query could not be submitted.
    #[error("query submission failed: {0}")]
    QuerySubmit(#[source] daybook_query::Error),

    /// The query did not reach a successful terminal state.
    #[error("query did not complete: {0}")]
    QueryWait(#[source] WaitError),

    /// Results of a successful query could not be read.
    #[error("fetching query results failed: {0}")]
    QueryFetch(#[source] daybook_query::Error),

    /// The report could not be written.
    #[error("writing report failed: {0}")]
    Storage(#[source] daybook_core::Error),

    /// Any other failure.
    #[error("{0}")]
    Unknown(String),
}

impl JobError {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QuerySubmit(_) => "query_submit",
            Self::QueryWait(_) => "query_wait",
            Self::QueryFetch(_) => "query_fetch",
            Self::Storage(_) => "storage",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The report was written.
    Success {
        /// Object key of the written report.
        report_key: String,
        /// Date shown in the report.
        report_date: String,
        /// Total event count shown in the report.
        event_count: String,
    },
    /// The run failed before the report was written.
    Failure {
        /// Stringified error.
        error_message: String,
    },
}

impl JobOutcome {
    /// Failure outcome for `error`.
    #[must_use]
    pub fn failure(error: &JobError) -> Self {
        Self::Failure {
            error_message: error.to_string(),
        }
    }

    /// True for [`JobOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A report written to storage.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    /// Object key.
    pub key: String,
    /// Derived report fields.
    pub document: ReportDocument,
    /// Rendered text as persisted.
    pub text: String,
}

/// Generates the daily summary report.
///
/// Collaborators are shared and may serve many invocations; each run owns its
/// request and query handle.
pub struct ReportJob {
    storage: Arc<dyn StorageBackend>,
    engine: Arc<dyn QueryEngine>,
    target: QueryTarget,
    notification: Option<(Arc<dyn Notifier>, EmailRoute)>,
    wait_policy: WaitPolicy,
}

impl std::fmt::Debug for ReportJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportJob")
            .field("engine", &self.engine.name())
            .field("target", &self.target)
            .field("email", &self.notification.as_ref().map(|(_, route)| route))
            .field("wait_policy", &self.wait_policy)
            .finish_non_exhaustive()
    }
}

impl ReportJob {
    /// Creates a job that does not send email.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        engine: Arc<dyn QueryEngine>,
        target: QueryTarget,
    ) -> Self {
        Self {
            storage,
            engine,
            target,
            notification: None,
            wait_policy: WaitPolicy::default(),
        }
    }

    /// Emails each report through `notifier` along `route`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, route: EmailRoute) -> Self {
        self.notification = Some((notifier, route));
        self
    }

    /// Overrides the completion wait settings.
    #[must_use]
    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Runs the report for the calendar date of `now`.
    pub async fn run(&self, now: DateTime<FixedOffset>) -> JobOutcome {
        self.run_for(ReportRequest::from_now(&now), now).await
    }

    /// Runs the report for `request`, stamping it with `now`.
    pub async fn run_for(&self, request: ReportRequest, now: DateTime<FixedOffset>) -> JobOutcome {
        let invocation_id = Ulid::new().to_string();
        let span = report_span("run", &request.date_string(), &invocation_id);

        async {
            let timer = RunTimer::start();
            match self.generate(&request, now).await {
                Ok(report) => {
                    self.notify(&report).await;
                    timer.finish("success");
                    tracing::info!(report_key = %report.key, "report generated");
                    JobOutcome::Success {
                        report_key: report.key,
                        report_date: report.document.report_date,
                        event_count: report.document.total_events,
                    }
                }
                Err(err) => {
                    timer.finish("failure");
                    tracing::error!(kind = err.kind(), error = %err, "report generation failed");
                    JobOutcome::failure(&err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Queries, renders and persists the report without notifying.
    ///
    /// # Errors
    ///
    /// Returns the first failing step.
    pub async fn generate(
        &self,
        request: &ReportRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<GeneratedReport, JobError> {
        let spec = self.target.query_spec(request);
        let handle = self
            .engine
            .submit(&spec)
            .await
            .map_err(JobError::QuerySubmit)?;
        tracing::debug!(query = %handle, engine = self.engine.name(), "waiting for query");

        wait_for_success(self.engine.as_ref(), &handle, &self.wait_policy)
            .await
            .map_err(JobError::QueryWait)?;

        let results = self
            .engine
            .fetch_results(&handle)
            .await
            .map_err(JobError::QueryFetch)?;
        if results.data_rows().len() > 1 {
            tracing::debug!(rows = results.data_rows().len(), "ignoring extra result rows");
        }

        let document = ReportDocument::from_results(request, &results, now);
        let text = document.render();
        let key = request.report_key();

        self.storage
            .put(&key, Bytes::from(text.clone()), PutOptions::text_plain())
            .await
            .map_err(JobError::Storage)?;

        Ok(GeneratedReport {
            key,
            document,
            text,
        })
    }

    /// Best-effort email; failures are logged and counted, never returned.
    async fn notify(&self, report: &GeneratedReport) {
        let Some((notifier, route)) = &self.notification else {
            tracing::debug!("email route not configured; skipping notification");
            return;
        };

        let message = EmailMessage {
            from: route.from.clone(),
            to: route.to.clone(),
            subject: report.document.email_subject(),
            body_text: report.text.clone(),
        };

        match notifier.send(&message).await {
            Ok(receipt) => {
                record_notification(true);
                tracing::info!(message_id = %receipt.message_id, "report email sent");
            }
            Err(err) => {
                record_notification(false);
                tracing::warn!(error = %err, "failed to send report email");
            }
        }
    }
}
