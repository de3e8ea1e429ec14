//! Athena query engine over the `x-amz-json-1.1` protocol.
//!
//! Uses three operations:
//!
//! - `AmazonAthena.StartQueryExecution` → [`QueryEngine::submit`]
//! - `AmazonAthena.GetQueryExecution` → [`QueryEngine::status`]
//! - `AmazonAthena.GetQueryResults` → [`QueryEngine::fetch_results`]
//!
//! Only the first result page is read. For varchar results the first row of
//! that page is the column header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use daybook_core::aws::{AwsJsonClient, Credentials, ServiceEndpoint};

use crate::QueryEngine;
use crate::error::Result;
use crate::types::{QueryHandle, QuerySpec, QueryState, ResultRow, ResultSet};

/// SigV4 signing name and endpoint prefix.
pub const SERVICE: &str = "athena";

const START_QUERY_EXECUTION: &str = "AmazonAthena.StartQueryExecution";
const GET_QUERY_EXECUTION: &str = "AmazonAthena.GetQueryExecution";
const GET_QUERY_RESULTS: &str = "AmazonAthena.GetQueryResults";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionRequest<'a> {
    query_string: &'a str,
    query_execution_context: QueryExecutionContext<'a>,
    result_configuration: ResultConfiguration<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    work_group: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionContext<'a> {
    database: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfiguration<'a> {
    output_location: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionResponse {
    query_execution_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionIdRequest<'a> {
    query_execution_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionResponse {
    query_execution: QueryExecution,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecution {
    status: QueryExecutionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionStatus {
    state: String,
    state_change_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsResponse {
    result_set: WireResultSet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResultSet {
    #[serde(default)]
    rows: Vec<WireRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireRow {
    #[serde(default)]
    data: Vec<WireDatum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDatum {
    var_char_value: Option<String>,
}

impl From<WireResultSet> for ResultSet {
    fn from(wire: WireResultSet) -> Self {
        ResultSet::new(
            wire.rows
                .into_iter()
                .map(|row| ResultRow::new(row.data.into_iter().map(|d| d.var_char_value).collect()))
                .collect(),
        )
    }
}

/// Athena-backed [`QueryEngine`].
#[derive(Debug, Clone)]
pub struct AthenaQueryEngine {
    client: AwsJsonClient,
}

impl AthenaQueryEngine {
    /// Wraps a client already configured for the `athena` signing name.
    #[must_use]
    pub fn new(client: AwsJsonClient) -> Self {
        Self { client }
    }

    /// Builds an engine for `region`, optionally against an endpoint override.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid endpoint.
    pub fn connect(region: &str, endpoint: Option<&str>, credentials: Credentials) -> Result<Self> {
        let endpoint = match endpoint {
            Some(url) => ServiceEndpoint::parse(url)?,
            None => ServiceEndpoint::regional(SERVICE, region)?,
        };
        let client = AwsJsonClient::new(SERVICE, endpoint, region, credentials)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl QueryEngine for AthenaQueryEngine {
    async fn submit(&self, spec: &QuerySpec) -> Result<QueryHandle> {
        let request = StartQueryExecutionRequest {
            query_string: &spec.sql_text,
            query_execution_context: QueryExecutionContext {
                database: &spec.database_name,
            },
            result_configuration: ResultConfiguration {
                output_location: &spec.output_location,
            },
            work_group: spec.workgroup.as_deref(),
        };

        let response: StartQueryExecutionResponse = self
            .client
            .call_target(START_QUERY_EXECUTION, &request)
            .await?;
        tracing::info!(
            query = %response.query_execution_id,
            database = %spec.database_name,
            "query submitted"
        );
        Ok(QueryHandle::new(response.query_execution_id))
    }

    async fn status(&self, handle: &QueryHandle) -> Result<QueryState> {
        let response: GetQueryExecutionResponse = self
            .client
            .call_target(
                GET_QUERY_EXECUTION,
                &QueryExecutionIdRequest {
                    query_execution_id: handle.as_str(),
                },
            )
            .await?;

        let status = response.query_execution.status;
        QueryState::from_wire(&status.state, status.state_change_reason)
    }

    async fn fetch_results(&self, handle: &QueryHandle) -> Result<ResultSet> {
        let response: GetQueryResultsResponse = self
            .client
            .call_target(
                GET_QUERY_RESULTS,
                &QueryExecutionIdRequest {
                    query_execution_id: handle.as_str(),
                },
            )
            .await?;
        Ok(response.result_set.into())
    }

    fn name(&self) -> &'static str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_uses_wire_names() {
        let request = StartQueryExecutionRequest {
            query_string: "SELECT 1",
            query_execution_context: QueryExecutionContext {
                database: "events_db",
            },
            result_configuration: ResultConfiguration {
                output_location: "s3://scratch/athena-results/",
            },
            work_group: None,
        };

        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "QueryString": "SELECT 1",
                "QueryExecutionContext": {"Database": "events_db"},
                "ResultConfiguration": {"OutputLocation": "s3://scratch/athena-results/"},
            })
        );
    }

    #[test]
    fn workgroup_is_sent_when_set() {
        let request = StartQueryExecutionRequest {
            query_string: "SELECT 1",
            query_execution_context: QueryExecutionContext { database: "db" },
            result_configuration: ResultConfiguration {
                output_location: "s3://b/",
            },
            work_group: Some("reports"),
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["WorkGroup"], "reports");
    }

    #[test]
    fn results_keep_missing_values_as_none() {
        let body = r#"{
            "ResultSet": {
                "Rows": [
                    {"Data": [{"VarCharValue": "report_date"}, {"VarCharValue": "total_events"}, {"VarCharValue": "unique_event_types"}]},
                    {"Data": [{"VarCharValue": "2024-03-01"}, {}, {"VarCharValue": "0"}]}
                ],
                "ResultSetMetadata": {"ColumnInfo": []}
            },
            "UpdateCount": 0
        }"#;

        let response: GetQueryResultsResponse = serde_json::from_str(body).expect("parse");
        let results: ResultSet = response.result_set.into();

        let row = results.first_data_row().expect("data row");
        assert_eq!(row.field(0), Some("2024-03-01"));
        assert_eq!(row.field(1), None);
        assert_eq!(row.field(2), Some("0"));
    }

    #[test]
    fn execution_status_parses() {
        let body = r#"{"QueryExecution": {"QueryExecutionId": "q", "Status": {"State": "FAILED", "StateChangeReason": "SYNTAX_ERROR"}}}"#;
        let response: GetQueryExecutionResponse = serde_json::from_str(body).expect("parse");
        let status = response.query_execution.status;
        assert_eq!(
            QueryState::from_wire(&status.state, status.state_change_reason).expect("state"),
            QueryState::Failed {
                reason: Some("SYNTAX_ERROR".into())
            }
        );
    }
}
