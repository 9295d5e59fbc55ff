use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::execution::ExecutionDescriptor;
use super::record::ResultRecord;

/// A positional binding value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl From<i64> for Binding {
    fn from(value: i64) -> Self {
        Binding::Integer(value)
    }
}

impl From<i32> for Binding {
    fn from(value: i32) -> Self {
        Binding::Integer(value as i64)
    }
}

impl From<u32> for Binding {
    fn from(value: u32) -> Self {
        Binding::Integer(value as i64)
    }
}

impl From<f64> for Binding {
    fn from(value: f64) -> Self {
        Binding::Float(value)
    }
}

impl From<bool> for Binding {
    fn from(value: bool) -> Self {
        Binding::Bool(value)
    }
}

impl From<String> for Binding {
    fn from(value: String) -> Self {
        Binding::Text(value)
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Binding::Text(value.to_string())
    }
}

/// A statement as handed over by the caller, before translation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub sql: String,
    pub bindings: Vec<Binding>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    pub fn bind(mut self, value: impl Into<Binding>) -> Self {
        self.bindings.push(value.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl From<&str> for QueryRequest {
    fn from(sql: &str) -> Self {
        QueryRequest::new(sql)
    }
}

impl From<String> for QueryRequest {
    fn from(sql: String) -> Self {
        QueryRequest::new(sql)
    }
}

/// Limit/offset request the engine cannot express natively.
///
/// Produced by the translator next to the compiled SQL and consumed by the
/// pagination rewriter once bindings are in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Pagination {
    pub fn new(limit: Option<u64>, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Inclusive `rn` range for this page, `None` when there is nothing to window
    pub fn row_range(&self) -> Option<(u64, u64)> {
        let limit = self.limit.filter(|limit| *limit > 0)?;
        let page = self.offset / limit + 1;
        Some((limit * (page - 1) + 1, limit * page))
    }
}

/// Compiled SQL plus the bindings its placeholders expect, in order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Binding>,
    pub pagination: Option<Pagination>,
}

/// Rows fetched by one `select` together with where they came from
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub rows: Vec<ResultRecord>,
    /// Object path of the result artifact under the configured bucket
    pub artifact_path: String,
    /// `None` when the connection is pretending
    pub execution: Option<ExecutionDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub query: String,
    pub time_ms: u64,
    pub pretended: bool,
    pub logged_at: DateTime<Utc>,
}

impl QueryLogEntry {
    pub fn new(query: String, time_ms: u64, pretended: bool) -> Self {
        Self {
            query,
            time_ms,
            pretended,
            logged_at: Utc::now(),
        }
    }
}
