// Athena Connection
//
// Entry points over the pipeline: translate -> bind -> paginate -> execute
// -> (optionally) materialize. Engine and store handles are built once when
// the connection is opened and shared by every call.

use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::AthenaError;
use crate::models::{
    ExecutionContext, ExecutionDescriptor, QueryLogEntry, QueryOutput, QueryRequest, ResultRecord,
};
use crate::services::bindings::BindingSubstitutor;
use crate::services::engine::{AthenaHttpEngine, QueryEngine};
use crate::services::executor::QueryExecutor;
use crate::services::materializer::ResultMaterializer;
use crate::services::pagination::PaginationRewriter;
use crate::services::translator::QueryTranslator;
use crate::storage::{ObjectStore, S3HttpStore};

pub struct AthenaConnection {
    translator: QueryTranslator,
    substitutor: BindingSubstitutor,
    executor: QueryExecutor,
    materializer: ResultMaterializer,
    pretending: bool,
    cancel: CancellationToken,
    logging_queries: bool,
    query_log: Mutex<Vec<QueryLogEntry>>,
}

impl AthenaConnection {
    /// Open a connection backed by the HTTP engine and store
    pub fn open(config: &Config) -> Result<Self, AthenaError> {
        config.validate()?;

        let engine = AthenaHttpEngine::new(config.athena_endpoint()?)?;
        let store = S3HttpStore::new(config.s3_endpoint()?, config.storage.bucket.clone())?;

        Ok(Self::new(config, Arc::new(engine), Arc::new(store)))
    }

    pub fn new(config: &Config, engine: Arc<dyn QueryEngine>, store: Arc<dyn ObjectStore>) -> Self {
        let context = ExecutionContext {
            database: config.athena.database.clone(),
            work_group: config.athena.work_group.clone(),
            output_location: config.s3output(),
        };

        Self {
            translator: QueryTranslator::new(config.athena.prefix.clone()),
            substitutor: BindingSubstitutor::new(config.literal_policy()),
            executor: QueryExecutor::new(engine, context, config.poll_policy()),
            materializer: ResultMaterializer::new(
                store,
                config.storage.output_folder.clone(),
                config.storage.staging_dir.clone(),
            ),
            pretending: config.athena.pretend,
            cancel: CancellationToken::new(),
            logging_queries: false,
            query_log: Mutex::new(Vec::new()),
        }
    }

    /// Share a cancellation token with every poll loop started by this connection
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn set_pretending(&mut self, pretending: bool) {
        self.pretending = pretending;
    }

    pub fn pretending(&self) -> bool {
        self.pretending
    }

    pub fn enable_query_log(&mut self) {
        self.logging_queries = true;
    }

    pub fn query_log(&self) -> Vec<QueryLogEntry> {
        self.lock_log().clone()
    }

    pub fn flush_query_log(&self) {
        self.lock_log().clear();
    }

    /// Final statement text as it would be submitted
    pub fn prepare(&self, request: QueryRequest) -> Result<String, AthenaError> {
        let compiled = self.translator.compile(request);
        let bound = self.substitutor.substitute(&compiled.sql, &compiled.bindings);
        PaginationRewriter::rewrite(&bound, compiled.pagination)
    }

    /// Run a statement for its effect
    pub async fn statement(&self, request: impl Into<QueryRequest>) -> Result<bool, AthenaError> {
        let request = request.into();
        let start = Instant::now();

        if self.pretending {
            self.log_query(&request.sql, start, true);
            return Ok(true);
        }

        let (query, result) = self.run(request).await;
        self.log_query(&query, start, false);
        result.map(|_| true)
    }

    /// Run a query and return its rows
    pub async fn select(
        &self,
        request: impl Into<QueryRequest>,
    ) -> Result<Vec<ResultRecord>, AthenaError> {
        Ok(self.fetch(request).await?.rows)
    }

    /// Run a query and return rows, artifact path and final execution status
    pub async fn fetch(&self, request: impl Into<QueryRequest>) -> Result<QueryOutput, AthenaError> {
        let request = request.into();
        let start = Instant::now();

        if self.pretending {
            self.log_query(&request.sql, start, true);
            return Ok(QueryOutput::default());
        }

        let (query, result) = self.run(request).await;
        let output = match result {
            Ok(execution) => self.materialize(execution).await,
            Err(e) => Err(e),
        };
        self.log_query(&query, start, false);
        output
    }

    /// Run a query and return the object path of its result artifact without
    /// downloading it
    pub async fn export(&self, request: impl Into<QueryRequest>) -> Result<String, AthenaError> {
        let request = request.into();
        let start = Instant::now();

        if self.pretending {
            self.log_query(&request.sql, start, true);
            return Ok(String::new());
        }

        let (query, result) = self.run(request).await;
        let path = result.and_then(|execution| {
            self.materializer
                .locate(&execution)
                .map(|location| location.object_path)
        });
        self.log_query(&query, start, false);
        path
    }

    /// Prepare and execute, handing back the text to log alongside the outcome
    async fn run(&self, request: QueryRequest) -> (String, Result<ExecutionDescriptor, AthenaError>) {
        let raw = request.sql.clone();
        match self.prepare(request) {
            Ok(statement) => {
                let result = self.executor.execute(&statement, &self.cancel).await;
                (statement, result)
            }
            Err(e) => (raw, Err(e)),
        }
    }

    async fn materialize(&self, execution: ExecutionDescriptor) -> Result<QueryOutput, AthenaError> {
        let location = self.materializer.locate(&execution)?;

        // Dropping the download on cancel also drops its staging guard
        let rows = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                return Err(AthenaError::Cancelled(execution.execution_id));
            }
            rows = self.materializer.materialize(&execution) => rows?,
        };

        Ok(QueryOutput {
            rows,
            artifact_path: location.object_path,
            execution: Some(execution),
        })
    }

    fn log_query(&self, query: &str, start: Instant, pretended: bool) {
        let time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(time_ms, pretended, "Athena query: {}", query);

        if self.logging_queries {
            self.lock_log()
                .push(QueryLogEntry::new(query.to_string(), time_ms, pretended));
        }
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, Vec<QueryLogEntry>> {
        self.query_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
