// Query Executor
//
// Submits a statement to the remote engine and waits for a terminal state.
// Waiting is bounded by the poll policy's deadline and can be aborted with a
// cancellation token; either way the engine is asked to stop the query.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AthenaError;
use crate::models::{ExecutionContext, ExecutionDescriptor, ExecutionState};
use crate::services::engine::adapter::{QueryEngine, Submission};

/// Failure reason absorbed as success: re-adding an existing partition is a no-op
const PARTITION_EXISTS: &str = "partition already exists";

/// Poll pacing and the overall wait deadline
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    /// Multiplier applied to the interval after every poll, 1.0 keeps it fixed
    pub backoff_factor: f64,
    /// `None` waits for as long as the engine takes
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(1),
            backoff_factor: 1.0,
            timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

impl PollPolicy {
    fn next_interval(&self, current: Duration) -> Duration {
        if !self.backoff_factor.is_finite() || self.backoff_factor <= 1.0 {
            return current;
        }
        let ceiling = self.max_interval.max(self.interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .map_or(ceiling, |next| next.min(ceiling))
    }
}

pub struct QueryExecutor {
    engine: Arc<dyn QueryEngine>,
    context: ExecutionContext,
    policy: PollPolicy,
}

impl QueryExecutor {
    pub fn new(engine: Arc<dyn QueryEngine>, context: ExecutionContext, policy: PollPolicy) -> Self {
        Self {
            engine,
            context,
            policy,
        }
    }

    /// Run `statement` and return its terminal descriptor
    pub async fn execute(
        &self,
        statement: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionDescriptor, AthenaError> {
        if cancel.is_cancelled() {
            return Err(AthenaError::Cancelled(
                "cancelled before submission".to_string(),
            ));
        }

        let execution_id = self.submit(statement).await?;
        self.wait_for_completion(execution_id, cancel).await
    }

    async fn submit(&self, statement: &str) -> Result<String, AthenaError> {
        let submission = Submission {
            statement,
            context: &self.context,
            client_request_token: Uuid::new_v4().to_string(),
        };

        let execution_id = self.engine.start_query_execution(submission).await?;

        if execution_id.trim().is_empty() {
            return Err(AthenaError::Submission(format!(
                "{} did not acknowledge the query submission",
                self.engine.engine_name()
            )));
        }

        tracing::debug!(
            "Submitted query {} to {} (database: {}, work group: {})",
            execution_id,
            self.engine.engine_name(),
            self.context.database,
            self.context.work_group
        );

        Ok(execution_id)
    }

    async fn wait_for_completion(
        &self,
        execution_id: String,
        cancel: &CancellationToken,
    ) -> Result<ExecutionDescriptor, AthenaError> {
        let started = Instant::now();
        let deadline = self.policy.timeout.map(|timeout| started + timeout);
        let mut interval = self.policy.interval;
        let mut descriptor = ExecutionDescriptor::pending(execution_id);

        loop {
            descriptor = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.stop(&descriptor.execution_id).await;
                    return Err(AthenaError::Cancelled(descriptor.execution_id));
                }
                latest = self.engine.get_query_execution(&descriptor.execution_id) => latest?,
            };

            match descriptor.state {
                ExecutionState::Succeeded => {
                    self.log_completion(&descriptor);
                    return Ok(descriptor);
                }
                ExecutionState::Failed | ExecutionState::Cancelled => {
                    return Self::resolve_failure(descriptor);
                }
                ExecutionState::Pending | ExecutionState::Queued | ExecutionState::Running => {
                    tracing::debug!(
                        "Query {} is {}, polling again in {:?}",
                        descriptor.execution_id,
                        descriptor.state,
                        interval
                    );
                }
            }

            let mut sleep_for = interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    self.stop(&descriptor.execution_id).await;
                    return Err(AthenaError::Timeout {
                        execution_id: descriptor.execution_id,
                        elapsed_secs: started.elapsed().as_secs(),
                    });
                }
                sleep_for = sleep_for.min(deadline - now);
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.stop(&descriptor.execution_id).await;
                    return Err(AthenaError::Cancelled(descriptor.execution_id));
                }
                _ = tokio::time::sleep(sleep_for) => {}
            }

            interval = self.policy.next_interval(interval);
        }
    }

    /// FAILED/CANCELLED is an error unless the partition already exists
    fn resolve_failure(descriptor: ExecutionDescriptor) -> Result<ExecutionDescriptor, AthenaError> {
        let reason = descriptor.reason();

        if reason.to_lowercase().contains(PARTITION_EXISTS) {
            tracing::warn!(
                "Query {} ended {} but the partition already exists, treating as success: {}",
                descriptor.execution_id,
                descriptor.state,
                reason
            );
            return Ok(descriptor);
        }

        Err(AthenaError::Execution {
            status: descriptor.state,
            reason: reason.to_string(),
        })
    }

    async fn stop(&self, execution_id: &str) {
        if let Err(e) = self.engine.stop_query_execution(execution_id).await {
            tracing::warn!("Failed to stop query {}: {}", execution_id, e);
        }
    }

    fn log_completion(&self, descriptor: &ExecutionDescriptor) {
        match &descriptor.statistics {
            Some(stats) => tracing::info!(
                "Query {} succeeded (engine time: {:?} ms, scanned: {:?} bytes)",
                descriptor.execution_id,
                stats.engine_execution_time_ms,
                stats.data_scanned_bytes
            ),
            None => tracing::info!("Query {} succeeded", descriptor.execution_id),
        }
    }
}
