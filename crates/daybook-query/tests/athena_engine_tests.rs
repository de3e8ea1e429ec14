//! Athena engine tests against a local fake of the JSON protocol.

#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::{Value, json};

use daybook_core::aws::Credentials;
use daybook_query::{
    AthenaQueryEngine, QueryEngine, QuerySpec, QueryState, WaitError, WaitPolicy,
    wait_for_success,
};

#[derive(Clone, Default)]
struct FakeAthena {
    started: Arc<Mutex<Vec<Value>>>,
    polls: Arc<AtomicUsize>,
    final_state: &'static str,
}

async fn athena_handler(
    State(fake): State<FakeAthena>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    if headers.get("authorization").is_none() {
        return (StatusCode::FORBIDDEN, r#"{"__type":"MissingAuthenticationToken"}"#.into());
    }
    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let request: Value = serde_json::from_str(&body).expect("json body");

    let response = match target {
        "AmazonAthena.StartQueryExecution" => {
            fake.started.lock().expect("lock").push(request);
            json!({"QueryExecutionId": "qe-1"})
        }
        "AmazonAthena.GetQueryExecution" => {
            assert_eq!(request["QueryExecutionId"], "qe-1");
            let poll = fake.polls.fetch_add(1, Ordering::SeqCst);
            let state = if poll == 0 { "RUNNING" } else { fake.final_state };
            json!({
                "QueryExecution": {
                    "QueryExecutionId": "qe-1",
                    "Status": {"State": state, "StateChangeReason": "line 1:8: boom"}
                }
            })
        }
        "AmazonAthena.GetQueryResults" => json!({
            "ResultSet": {
                "Rows": [
                    {"Data": [
                        {"VarCharValue": "report_date"},
                        {"VarCharValue": "total_events"},
                        {"VarCharValue": "unique_event_types"}
                    ]},
                    {"Data": [
                        {"VarCharValue": "2024-03-01"},
                        {"VarCharValue": "1532"},
                        {"VarCharValue": "12"}
                    ]}
                ]
            }
        }),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                r#"{"__type":"UnknownOperationException"}"#.into(),
            );
        }
    };

    (StatusCode::OK, response.to_string())
}

async fn start_fake(final_state: &'static str) -> (String, FakeAthena) {
    let fake = FakeAthena {
        final_state,
        ..FakeAthena::default()
    };
    let app = Router::new()
        .route("/", post(athena_handler))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr: SocketAddr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve fake athena");
    });

    (format!("http://{addr}"), fake)
}

fn engine(base_url: &str) -> AthenaQueryEngine {
    AthenaQueryEngine::connect(
        "us-east-1",
        Some(base_url),
        Credentials::new("AKIDTEST", "secret", None),
    )
    .expect("engine")
}

fn spec() -> QuerySpec {
    QuerySpec {
        sql_text: "SELECT COUNT(*) FROM events_db.events_raw".into(),
        database_name: "events_db".into(),
        output_location: "s3://scratch/athena-results/".into(),
        workgroup: Some("reports".into()),
    }
}

#[tokio::test]
async fn submit_wait_and_fetch() {
    let (base_url, fake) = start_fake("SUCCEEDED").await;
    let engine = engine(&base_url);

    let handle = engine.submit(&spec()).await.expect("submit");
    assert_eq!(handle.as_str(), "qe-1");

    wait_for_success(&engine, &handle, &WaitPolicy::new(Duration::from_millis(5), 5))
        .await
        .expect("query should succeed");
    assert_eq!(fake.polls.load(Ordering::SeqCst), 2);

    let results = engine.fetch_results(&handle).await.expect("fetch");
    let row = results.first_data_row().expect("data row");
    assert_eq!(row.field(0), Some("2024-03-01"));
    assert_eq!(row.field(1), Some("1532"));
    assert_eq!(row.field(2), Some("12"));

    let started = fake.started.lock().expect("lock").clone();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0]["QueryExecutionContext"]["Database"], "events_db");
    assert_eq!(
        started[0]["ResultConfiguration"]["OutputLocation"],
        "s3://scratch/athena-results/"
    );
    assert_eq!(started[0]["WorkGroup"], "reports");
}

#[tokio::test]
async fn failed_query_reports_reason() {
    let (base_url, _fake) = start_fake("FAILED").await;
    let engine = engine(&base_url);

    let handle = engine.submit(&spec()).await.expect("submit");
    let err = wait_for_success(&engine, &handle, &WaitPolicy::new(Duration::ZERO, 5))
        .await
        .expect_err("query should fail");

    assert!(matches!(err, WaitError::Failed { .. }));
    assert!(err.to_string().contains("boom"), "{err}");
}

#[tokio::test]
async fn status_reports_running_first() {
    let (base_url, _fake) = start_fake("SUCCEEDED").await;
    let engine = engine(&base_url);

    let handle = engine.submit(&spec()).await.expect("submit");
    assert_eq!(engine.status(&handle).await.expect("status"), QueryState::Running);
    assert_eq!(engine.status(&handle).await.expect("status"), QueryState::Succeeded);
}
