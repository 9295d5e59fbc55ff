use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ExecutionState;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the query pipeline
#[derive(Debug, Error)]
pub enum AthenaError {
    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Athena query error [{status}]: {reason}")]
    Execution {
        status: ExecutionState,
        reason: String,
    },

    #[error("Pagination syntax error: {0}")]
    PaginationSyntax(String),

    #[error("Unable to download file from S3: {path}")]
    Download {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Result parse error: {0}")]
    ResultParse(String),

    #[error("Query {execution_id} did not finish within {elapsed_secs} seconds")]
    Timeout {
        execution_id: String,
        elapsed_secs: u64,
    },

    #[error("Query {0} was cancelled by the caller")]
    Cancelled(String),

    #[error("Query engine error: {0}")]
    Engine(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AthenaError {
    pub fn download(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        AthenaError::Download {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            AthenaError::Submission(_) => "SUBMISSION_ERROR",
            AthenaError::Execution { .. } => "EXECUTION_ERROR",
            AthenaError::PaginationSyntax(_) => "PAGINATION_SYNTAX_ERROR",
            AthenaError::Download { .. } => "DOWNLOAD_ERROR",
            AthenaError::ResultParse(_) => "RESULT_PARSE_ERROR",
            AthenaError::Timeout { .. } => "TIMEOUT",
            AthenaError::Cancelled(_) => "CANCELLED",
            AthenaError::Engine(_) => "ENGINE_ERROR",
            AthenaError::Storage(_) => "STORAGE_ERROR",
            AthenaError::Config(_) => "CONFIG_ERROR",
            AthenaError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<&AthenaError> for ErrorResponse {
    fn from(err: &AthenaError) -> Self {
        let mut detail = ErrorDetail::new(err.code(), err.to_string());

        // Surface the wrapped cause for download failures
        if let Some(source) = std::error::Error::source(err) {
            detail = detail.with_details(source.to_string());
        }

        ErrorResponse { error: detail }
    }
}

impl From<config::ConfigError> for AthenaError {
    fn from(err: config::ConfigError) -> Self {
        AthenaError::Config(err.to_string())
    }
}
