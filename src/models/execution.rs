use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    Pending,
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Pending => "PENDING",
            ExecutionState::Queued => "QUEUED",
            ExecutionState::Running => "RUNNING",
            ExecutionState::Succeeded => "SUCCEEDED",
            ExecutionState::Failed => "FAILED",
            ExecutionState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::Failed | ExecutionState::Cancelled
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and under which workgroup a statement runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub database: String,
    pub work_group: String,
    pub output_location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    pub engine_execution_time_ms: Option<u64>,
    pub total_execution_time_ms: Option<u64>,
    pub data_scanned_bytes: Option<u64>,
}

/// Latest known status of a submitted query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDescriptor {
    pub execution_id: String,
    pub state: ExecutionState,
    /// Set once the query has succeeded
    pub result_location: Option<String>,
    /// Set on FAILED / CANCELLED
    pub state_change_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub statistics: Option<ExecutionStatistics>,
}

impl ExecutionDescriptor {
    pub fn pending(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            state: ExecutionState::Pending,
            result_location: None,
            state_change_reason: None,
            submitted_at: None,
            completed_at: None,
            statistics: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn reason(&self) -> &str {
        self.state_change_reason.as_deref().unwrap_or_default()
    }
}
