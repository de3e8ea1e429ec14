//! Report job metrics.
//!
//! - Runs by outcome
//! - Run duration
//! - Notification deliveries and failures
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use std::sync::OnceLock;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Total report runs, labelled by `outcome`.
pub const REPORT_RUNS_TOTAL: &str = "report_runs_total";

/// Report run duration in seconds.
pub const REPORT_RUN_DURATION: &str = "report_run_duration_seconds";

/// Report emails accepted by the notifier.
pub const REPORT_NOTIFICATIONS_SENT_TOTAL: &str = "report_notifications_sent_total";

/// Report emails the notifier rejected.
pub const REPORT_NOTIFICATIONS_FAILED_TOTAL: &str = "report_notifications_failed_total";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder.
///
/// Safe to call multiple times; subsequent calls are no-ops.
///
/// # Panics
///
/// Panics if another global recorder is already installed.
#[allow(clippy::panic)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .unwrap_or_else(|e| panic!("failed to install prometheus recorder: {e}"));

            describe_counter!(REPORT_RUNS_TOTAL, "Report runs by outcome");
            describe_histogram!(REPORT_RUN_DURATION, "Duration of report runs in seconds");
            describe_counter!(REPORT_NOTIFICATIONS_SENT_TOTAL, "Report emails sent");
            describe_counter!(
                REPORT_NOTIFICATIONS_FAILED_TOTAL,
                "Report emails that failed to send"
            );

            tracing::info!("Prometheus metrics recorder initialized");
            handle
        })
        .clone()
}

/// Returns the global Prometheus handle, if initialized.
#[must_use]
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

/// Handler for the `/metrics` endpoint.
pub async fn serve_metrics() -> impl IntoResponse {
    match prometheus_handle() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain; charset=utf-8")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Records the result of a notification attempt.
pub fn record_notification(sent: bool) {
    if sent {
        counter!(REPORT_NOTIFICATIONS_SENT_TOTAL).increment(1);
    } else {
        counter!(REPORT_NOTIFICATIONS_FAILED_TOTAL).increment(1);
    }
}

/// Measures one report run.
#[derive(Debug)]
pub struct RunTimer {
    start: Instant,
}

impl RunTimer {
    /// Starts timing a run.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Records the run under `outcome` (`success` or `failure`).
    pub fn finish(self, outcome: &'static str) {
        let duration = self.start.elapsed().as_secs_f64();
        let labels = [("outcome", outcome)];

        counter!(REPORT_RUNS_TOTAL, &labels).increment(1);
        histogram!(REPORT_RUN_DURATION, &labels).record(duration);
        tracing::debug!(outcome, duration_secs = duration, "recorded run metrics");
    }
}
