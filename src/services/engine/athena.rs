// Amazon Athena client over the AWS JSON 1.1 HTTP protocol
// Each operation is a POST to the service endpoint, selected by X-Amz-Target
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AthenaError;
use crate::models::{ExecutionDescriptor, ExecutionState, ExecutionStatistics};
use crate::services::engine::adapter::{QueryEngine, Submission};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AmazonAthena";

pub struct AthenaHttpEngine {
    endpoint: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionRequest<'a> {
    query_string: &'a str,
    query_execution_context: QueryExecutionContext<'a>,
    result_configuration: ResultConfigurationRequest<'a>,
    work_group: &'a str,
    client_request_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionContext<'a> {
    database: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfigurationRequest<'a> {
    output_location: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionIdRequest<'a> {
    query_execution_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionResponse {
    #[serde(default)]
    query_execution_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionResponse {
    query_execution: QueryExecution,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecution {
    query_execution_id: String,
    #[serde(default)]
    result_configuration: Option<ResultConfiguration>,
    status: QueryExecutionStatus,
    #[serde(default)]
    statistics: Option<QueryExecutionStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfiguration {
    #[serde(default)]
    output_location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionStatus {
    state: ExecutionState,
    #[serde(default)]
    state_change_reason: Option<String>,
    /// Epoch seconds with fractional part
    #[serde(default)]
    submission_date_time: Option<f64>,
    #[serde(default)]
    completion_date_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionStatistics {
    #[serde(default)]
    engine_execution_time_in_millis: Option<u64>,
    #[serde(default)]
    total_execution_time_in_millis: Option<u64>,
    #[serde(default)]
    data_scanned_in_bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

fn epoch_to_datetime(seconds: Option<f64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| DateTime::from_timestamp_millis((s * 1000.0) as i64))
}

impl From<QueryExecution> for ExecutionDescriptor {
    fn from(execution: QueryExecution) -> Self {
        ExecutionDescriptor {
            execution_id: execution.query_execution_id,
            state: execution.status.state,
            result_location: execution
                .result_configuration
                .and_then(|config| config.output_location),
            state_change_reason: execution.status.state_change_reason,
            submitted_at: epoch_to_datetime(execution.status.submission_date_time),
            completed_at: epoch_to_datetime(execution.status.completion_date_time),
            statistics: execution.statistics.map(|stats| ExecutionStatistics {
                engine_execution_time_ms: stats.engine_execution_time_in_millis,
                total_execution_time_ms: stats.total_execution_time_in_millis,
                data_scanned_bytes: stats.data_scanned_in_bytes,
            }),
        }
    }
}

impl AthenaHttpEngine {
    pub fn new(endpoint: &str) -> Result<Self, AthenaError> {
        let url = Url::parse(endpoint)
            .map_err(|e| AthenaError::Config(format!("Invalid Athena endpoint: {}", e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AthenaError::Config(
                "Athena endpoint must use http:// or https://".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AthenaError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: url.as_str().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Call one Athena operation and decode its JSON response
    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp, AthenaError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)
            .map_err(|e| AthenaError::Internal(format!("Failed to encode {}: {}", operation, e)))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .body(body)
            .send()
            .await
            .map_err(|e| AthenaError::Engine(format!("{} request failed: {}", operation, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let detail = match serde_json::from_str::<ServiceError>(&error_body) {
                Ok(ServiceError {
                    kind: Some(kind),
                    message,
                }) => format!("{}: {}", kind, message.unwrap_or_default()),
                _ => error_body,
            };
            return Err(AthenaError::Engine(format!(
                "{} failed ({}): {}",
                operation, status, detail
            )));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| AthenaError::Engine(format!("Failed to parse {} response: {}", operation, e)))
    }
}

#[async_trait::async_trait]
impl QueryEngine for AthenaHttpEngine {
    async fn start_query_execution(&self, submission: Submission<'_>) -> Result<String, AthenaError> {
        let request = StartQueryExecutionRequest {
            query_string: submission.statement,
            query_execution_context: QueryExecutionContext {
                database: &submission.context.database,
            },
            result_configuration: ResultConfigurationRequest {
                output_location: &submission.context.output_location,
            },
            work_group: &submission.context.work_group,
            client_request_token: &submission.client_request_token,
        };

        let response: StartQueryExecutionResponse =
            self.call("StartQueryExecution", &request).await?;

        Ok(response.query_execution_id.unwrap_or_default())
    }

    async fn get_query_execution(&self, execution_id: &str) -> Result<ExecutionDescriptor, AthenaError> {
        let request = QueryExecutionIdRequest {
            query_execution_id: execution_id,
        };

        let response: GetQueryExecutionResponse = self.call("GetQueryExecution", &request).await?;

        Ok(response.query_execution.into())
    }

    async fn stop_query_execution(&self, execution_id: &str) -> Result<(), AthenaError> {
        let request = QueryExecutionIdRequest {
            query_execution_id: execution_id,
        };

        let _: serde_json::Value = self.call("StopQueryExecution", &request).await?;
        Ok(())
    }

    fn engine_name(&self) -> &str {
        "athena"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(matches!(
            AthenaHttpEngine::new("s3://bucket"),
            Err(AthenaError::Config(_))
        ));
        assert!(AthenaHttpEngine::new("http://localhost:4566/").is_ok());
    }

    #[test]
    fn test_start_request_wire_format() {
        let request = StartQueryExecutionRequest {
            query_string: "SELECT 1",
            query_execution_context: QueryExecutionContext { database: "analytics" },
            result_configuration: ResultConfigurationRequest {
                output_location: "s3://query-results/athena",
            },
            work_group: "primary",
            client_request_token: "token",
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["QueryString"], "SELECT 1");
        assert_eq!(json["QueryExecutionContext"]["Database"], "analytics");
        assert_eq!(json["ResultConfiguration"]["OutputLocation"], "s3://query-results/athena");
        assert_eq!(json["WorkGroup"], "primary");
    }

    #[test]
    fn test_decode_succeeded_execution() {
        let body = r#"{
            "QueryExecution": {
                "QueryExecutionId": "abc-123",
                "Query": "SELECT 1",
                "ResultConfiguration": {"OutputLocation": "s3://query-results/athena/abc-123.csv"},
                "Status": {
                    "State": "SUCCEEDED",
                    "SubmissionDateTime": 1700000000.5,
                    "CompletionDateTime": 1700000003.0
                },
                "Statistics": {"EngineExecutionTimeInMillis": 2100, "DataScannedInBytes": 4096}
            }
        }"#;

        let response: GetQueryExecutionResponse = serde_json::from_str(body).unwrap();
        let descriptor: ExecutionDescriptor = response.query_execution.into();

        assert_eq!(descriptor.execution_id, "abc-123");
        assert_eq!(descriptor.state, ExecutionState::Succeeded);
        assert_eq!(
            descriptor.result_location.as_deref(),
            Some("s3://query-results/athena/abc-123.csv")
        );
        assert_eq!(descriptor.submitted_at.unwrap().timestamp_millis(), 1_700_000_000_500);
        let stats = descriptor.statistics.unwrap();
        assert_eq!(stats.engine_execution_time_ms, Some(2100));
        assert_eq!(stats.data_scanned_bytes, Some(4096));
    }

    #[test]
    fn test_decode_failed_execution() {
        let body = r#"{
            "QueryExecution": {
                "QueryExecutionId": "abc-456",
                "Status": {"State": "FAILED", "StateChangeReason": "SYNTAX_ERROR: line 1:8"}
            }
        }"#;

        let response: GetQueryExecutionResponse = serde_json::from_str(body).unwrap();
        let descriptor: ExecutionDescriptor = response.query_execution.into();

        assert_eq!(descriptor.state, ExecutionState::Failed);
        assert_eq!(descriptor.reason(), "SYNTAX_ERROR: line 1:8");
        assert!(descriptor.result_location.is_none());
    }
}
