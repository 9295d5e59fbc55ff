// In-memory engine and store doubles shared by unit tests
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::AthenaError;
use crate::models::{ExecutionContext, ExecutionDescriptor, ExecutionState};
use crate::services::engine::adapter::{QueryEngine, Submission};
use crate::storage::ObjectStore;

/// Engine that replays a fixed sequence of states, repeating the last one
pub struct ScriptedEngine {
    acknowledge: bool,
    script: Mutex<VecDeque<ExecutionDescriptor>>,
    submitted: Mutex<Vec<String>>,
    contexts: Mutex<Vec<ExecutionContext>>,
    stopped: Mutex<Vec<String>>,
    polls: Mutex<usize>,
}

impl ScriptedEngine {
    pub const EXECUTION_ID: &'static str = "q-1";

    pub fn new(script: Vec<ExecutionDescriptor>) -> Self {
        Self {
            acknowledge: true,
            script: Mutex::new(script.into()),
            submitted: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
        }
    }

    pub fn unacknowledged() -> Self {
        Self {
            acknowledge: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn state(state: ExecutionState) -> ExecutionDescriptor {
        ExecutionDescriptor {
            state,
            ..ExecutionDescriptor::pending(Self::EXECUTION_ID)
        }
    }

    pub fn succeeded(result_location: &str) -> ExecutionDescriptor {
        ExecutionDescriptor {
            result_location: Some(result_location.to_string()),
            ..Self::state(ExecutionState::Succeeded)
        }
    }

    pub fn failed(reason: &str) -> ExecutionDescriptor {
        ExecutionDescriptor {
            state_change_reason: Some(reason.to_string()),
            ..Self::state(ExecutionState::Failed)
        }
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn last_context(&self) -> Option<ExecutionContext> {
        self.contexts.lock().unwrap().last().cloned()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl QueryEngine for ScriptedEngine {
    async fn start_query_execution(&self, submission: Submission<'_>) -> Result<String, AthenaError> {
        self.submitted
            .lock()
            .unwrap()
            .push(submission.statement.to_string());
        self.contexts
            .lock()
            .unwrap()
            .push(submission.context.clone());

        if self.acknowledge {
            Ok(Self::EXECUTION_ID.to_string())
        } else {
            Ok(String::new())
        }
    }

    async fn get_query_execution(&self, execution_id: &str) -> Result<ExecutionDescriptor, AthenaError> {
        *self.polls.lock().unwrap() += 1;

        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };

        next.ok_or_else(|| AthenaError::Engine(format!("No script for {}", execution_id)))
    }

    async fn stop_query_execution(&self, execution_id: &str) -> Result<(), AthenaError> {
        self.stopped.lock().unwrap().push(execution_id.to_string());
        Ok(())
    }

    fn engine_name(&self) -> &str {
        "scripted"
    }
}

/// Object store backed by a map of path to bytes
#[derive(Default)]
pub struct InMemoryStore {
    objects: HashMap<String, Vec<u8>>,
    downloads: Mutex<Vec<String>>,
    stall: bool,
}

impl InMemoryStore {
    pub fn with_object(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(path.to_string(), contents.into());
        self
    }

    /// Write the object, then never finish the download
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ObjectStore for InMemoryStore {
    async fn download(
        &self,
        path: &str,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, AthenaError> {
        self.downloads.lock().unwrap().push(path.to_string());

        let contents = self
            .objects
            .get(path)
            .ok_or_else(|| AthenaError::Storage(format!("Object {} not found", path)))?;

        dest.write_all(contents)
            .await
            .map_err(|e| AthenaError::Storage(e.to_string()))?;
        dest.flush()
            .await
            .map_err(|e| AthenaError::Storage(e.to_string()))?;

        if self.stall {
            std::future::pending::<()>().await;
        }

        Ok(contents.len() as u64)
    }

    fn bucket(&self) -> &str {
        "query-results"
    }
}
