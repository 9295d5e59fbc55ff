// Query engine trait - the remote side of submit/poll
use crate::error::AthenaError;
use crate::models::{ExecutionContext, ExecutionDescriptor};

/// Submission request for one statement
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    pub statement: &'a str,
    pub context: &'a ExecutionContext,
    /// Idempotency token, a retried submission with the same token is not run twice
    pub client_request_token: String,
}

/// Asynchronous, poll-based query engine that writes results to object storage
#[async_trait::async_trait]
pub trait QueryEngine: Send + Sync {
    /// Start a query and return its execution id.
    ///
    /// An empty id means the engine did not acknowledge the submission.
    async fn start_query_execution(&self, submission: Submission<'_>) -> Result<String, AthenaError>;

    /// Fetch the latest status of an execution
    async fn get_query_execution(&self, execution_id: &str) -> Result<ExecutionDescriptor, AthenaError>;

    /// Ask the engine to stop a running execution
    async fn stop_query_execution(&self, execution_id: &str) -> Result<(), AthenaError>;

    /// Engine name used in logs
    fn engine_name(&self) -> &str;
}
