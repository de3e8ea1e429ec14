//! End-to-end report runs against in-memory collaborators.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use serde_json::{Value, json};

use daybook_query::{InMemoryQueryEngine, QueryState, WaitPolicy};
use daybook_report::{EmailRoute, JobOutcome, QueryTarget, ReportJob, ReportRequest, handle};
use daybook_test_utils::{
    ReportHarness, StorageOp, fixed_time, header_only_results, init_test_logging, summary_results,
};

const KEY: &str = "reports/daily_report_2024-03-01.txt";

fn target() -> QueryTarget {
    QueryTarget {
        database: "events_db".into(),
        table: "events_raw".into(),
        output_location: "s3://scratch/athena-results/".into(),
        workgroup: None,
    }
}

fn route() -> EmailRoute {
    EmailRoute {
        from: "reports@example.com".into(),
        to: "ops@example.com".into(),
    }
}

fn job(harness: &ReportHarness) -> ReportJob {
    ReportJob::new(harness.storage.clone(), harness.engine.clone(), target())
        .with_wait_policy(WaitPolicy::new(Duration::ZERO, 5))
}

fn emailing_job(harness: &ReportHarness) -> ReportJob {
    job(harness).with_notifier(harness.notifier.clone(), route())
}

#[tokio::test]
async fn daily_example_succeeds() {
    init_test_logging();
    let harness = ReportHarness::new(summary_results("2024-03-01", "1532", "12"));

    let outcome = emailing_job(&harness)
        .run(fixed_time("2024-03-01T06:00:00+00:00"))
        .await;

    assert_eq!(
        outcome,
        JobOutcome::Success {
            report_key: KEY.into(),
            report_date: "2024-03-01".into(),
            event_count: "1532".into(),
        }
    );
    assert_eq!(
        harness.storage.text(KEY).expect("report stored"),
        "=== DAILY SUMMARY REPORT ===\n\
         Report Date: 2024-03-01\n\
         Total Events: 1532\n\
         Unique Event Types: 12\n\
         \n\
         Generated at: 2024-03-01T06:00:00+00:00\n"
    );
    assert_eq!(harness.storage.content_type(KEY).as_deref(), Some("text/plain"));

    let submitted = harness.engine.submitted().expect("submitted");
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].sql_text.contains("date('2024-03-01')"));
    assert_eq!(submitted[0].output_location, "s3://scratch/athena-results/");

    let sent = harness.notifier.sent().expect("sent");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Daily Summary Report - 2024-03-01");
    assert_eq!(Some(sent[0].body_text.clone()), harness.storage.text(KEY));
}

#[tokio::test]
async fn header_only_results_use_defaults() {
    let harness = ReportHarness::new(header_only_results());

    let outcome = job(&harness).run(fixed_time("2024-03-01T06:00:00+00:00")).await;

    assert_eq!(
        outcome,
        JobOutcome::Success {
            report_key: KEY.into(),
            report_date: "2024-03-01".into(),
            event_count: "0".into(),
        }
    );
    let text = harness.storage.text(KEY).expect("report stored");
    assert!(text.contains("Total Events: 0\n"));
    assert!(text.contains("Unique Event Types: 0\n"));
}

#[tokio::test]
async fn query_that_never_succeeds_fails_the_run() {
    let harness = ReportHarness::with_engine(InMemoryQueryEngine::never_finishes());

    let outcome = emailing_job(&harness)
        .run(fixed_time("2024-03-01T06:00:00+00:00"))
        .await;

    let JobOutcome::Failure { error_message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(!error_message.is_empty());
    assert_eq!(harness.engine.status_calls().expect("status calls"), 5);
    assert!(harness.storage.puts().is_empty());
    assert!(harness.notifier.sent().expect("sent").is_empty());
}

#[tokio::test]
async fn cancelled_query_fails_the_run() {
    let harness = ReportHarness::with_engine(
        InMemoryQueryEngine::new(summary_results("2024-03-01", "1", "1")).with_status_script(
            vec![
                QueryState::Queued,
                QueryState::Cancelled {
                    reason: Some("user cancelled".into()),
                },
            ],
        ),
    );

    let outcome = job(&harness).run(fixed_time("2024-03-01T06:00:00+00:00")).await;
    let JobOutcome::Failure { error_message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(error_message.contains("user cancelled"), "{error_message}");
}

#[tokio::test]
async fn storage_failure_fails_the_run() {
    let harness = ReportHarness::new(summary_results("2024-03-01", "1532", "12"));
    harness.storage.inject_failure("reports/");

    let outcome = emailing_job(&harness)
        .run(fixed_time("2024-03-01T06:00:00+00:00"))
        .await;

    let JobOutcome::Failure { error_message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(error_message.contains("writing report failed"), "{error_message}");
    assert!(harness.notifier.sent().expect("sent").is_empty());
}

#[tokio::test]
async fn unconfigured_email_skips_notification() {
    let harness = ReportHarness::new(summary_results("2024-03-01", "1532", "12"));

    let outcome = job(&harness).run(fixed_time("2024-03-01T06:00:00+00:00")).await;

    assert!(outcome.is_success());
    assert!(harness.notifier.sent().expect("sent").is_empty());
}

#[tokio::test]
async fn notification_failure_still_succeeds() {
    let harness = ReportHarness::new(summary_results("2024-03-01", "1532", "12"))
        .with_failing_notifier("Email address is not verified.");

    let outcome = emailing_job(&harness)
        .run(fixed_time("2024-03-01T06:00:00+00:00"))
        .await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(harness.notifier.sent().expect("sent").len(), 1);
    assert!(harness.storage.text(KEY).is_some());
}

#[tokio::test]
async fn second_run_overwrites_first() {
    let harness = ReportHarness::new(summary_results("2024-03-01", "100", "3"));
    let job = job(&harness);
    let now = fixed_time("2024-03-01T06:00:00+00:00");

    assert!(job.run(now).await.is_success());
    harness
        .engine
        .set_results(summary_results("2024-03-01", "250", "4"))
        .expect("set results");
    assert!(job.run(now).await.is_success());

    let text = harness.storage.text(KEY).expect("report stored");
    assert!(text.contains("Total Events: 250\n"));
    assert!(text.contains("Unique Event Types: 4\n"));
    assert_eq!(harness.storage.version(KEY), Some(2));
    assert_eq!(harness.storage.paths(), vec![KEY.to_string()]);
}

#[tokio::test]
async fn key_uses_requested_date_and_outcome_uses_row_date() {
    let harness = ReportHarness::new(summary_results("2024-02-29", "7", "2"));
    let request = ReportRequest::for_date(NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"));

    let outcome = job(&harness)
        .run_for(request, fixed_time("2024-03-02T06:00:00+00:00"))
        .await;

    assert_eq!(
        outcome,
        JobOutcome::Success {
            report_key: KEY.into(),
            report_date: "2024-02-29".into(),
            event_count: "7".into(),
        }
    );
}

#[tokio::test]
async fn handler_honours_event_date() {
    let harness = ReportHarness::new(summary_results("2023-12-31", "42", "5"));

    let response = handle(
        &job(&harness),
        &json!({"report_date": "2023-12-31", "source": "scheduler"}),
        fixed_time("2024-03-01T06:00:00+00:00"),
    )
    .await;

    assert_eq!(response.status_code, 200);
    let body: Value = serde_json::from_str(&response.body).expect("json body");
    assert_eq!(body["report_key"], "reports/daily_report_2023-12-31.txt");
    assert_eq!(body["event_count"], "42");
    assert_eq!(
        harness.storage.puts(),
        vec![StorageOp::Put {
            path: "reports/daily_report_2023-12-31.txt".into(),
            size: harness
                .storage
                .text("reports/daily_report_2023-12-31.txt")
                .expect("report stored")
                .len(),
            content_type: Some("text/plain".into()),
        }]
    );
}

#[tokio::test]
async fn handler_rejects_bad_event_date() {
    let harness = ReportHarness::new(summary_results("2024-03-01", "1", "1"));

    let response = handle(
        &job(&harness),
        &json!({"report_date": "yesterday"}),
        fixed_time("2024-03-01T06:00:00+00:00"),
    )
    .await;

    assert_eq!(response.status_code, 500);
    let body: Value = serde_json::from_str(&response.body).expect("json body");
    assert!(body["error"].as_str().expect("error").contains("yesterday"));
    assert!(harness.engine.submitted().expect("submitted").is_empty());
}

#[tokio::test]
async fn handler_reports_failures_as_500() {
    let harness = ReportHarness::with_engine(
        InMemoryQueryEngine::new(header_only_results()).with_submit_error("throttled"),
    );

    let response = handle(&job(&harness), &Value::Null, fixed_time("2024-03-01T06:00:00+00:00")).await;

    assert_eq!(response.status_code, 500);
    let body: Value = serde_json::from_str(&response.body).expect("json body");
    assert!(body["error"].as_str().expect("error").contains("throttled"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn report_reflects_row_for_any_date(
        offset in 0u64..60_000,
        total in 0u64..10_000_000,
        unique in 0u32..1_000,
    ) {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|d| d.checked_add_days(Days::new(offset)))
            .expect("date in range");
        let date_str = date.format("%Y-%m-%d").to_string();
        let harness = ReportHarness::new(summary_results(
            &date_str,
            &total.to_string(),
            &unique.to_string(),
        ));
        let job = job(&harness);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        let outcome = runtime.block_on(
            job.run_for(ReportRequest::for_date(date), fixed_time("2024-03-01T06:00:00+00:00")),
        );

        let key = format!("reports/daily_report_{date_str}.txt");
        prop_assert!(outcome.is_success());
        let text = harness.storage.text(&key).expect("report stored");
        let total_line = format!("Total Events: {total}\n");
        let unique_line = format!("Unique Event Types: {unique}\n");
        prop_assert!(text.contains(&total_line));
        prop_assert!(text.contains(&unique_line));
    }
}
