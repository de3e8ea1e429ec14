//! HTTP surface for schedulers that trigger over HTTP.
//!
//! - `POST /invoke`: runs one invocation; the event is the JSON request body
//! - `GET /health`: shallow liveness check
//! - `GET /metrics`: Prometheus text

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;
use serde_json::Value;

use crate::handler::handle;
use crate::job::ReportJob;
use crate::metrics::serve_metrics;

/// Clock used to stamp invocations.
pub type Clock = fn() -> DateTime<FixedOffset>;

/// Current local time with its offset.
#[must_use]
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

#[derive(Clone)]
struct ServiceState {
    job: Arc<ReportJob>,
    clock: Clock,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Router using the local clock.
pub fn router(job: Arc<ReportJob>) -> Router {
    router_with_clock(job, local_now)
}

/// Router with an explicit clock.
pub fn router_with_clock(job: Arc<ReportJob>, clock: Clock) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/invoke", post(invoke))
        .route("/metrics", get(serve_metrics))
        .with_state(ServiceState { job, clock })
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn invoke(State(state): State<ServiceState>, body: Bytes) -> Response {
    let event = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(event) => event,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": format!("invalid event JSON: {e}")})),
                )
                    .into_response();
            }
        }
    };

    let response = handle(&state.job, &event, (state.clock)()).await;
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response()
}
