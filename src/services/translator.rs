// Query Translation
//
// Compiles builder-level LIMIT/OFFSET requests for an engine that only
// understands a plain, non-offsetting LIMIT. Offsets are handed to the
// pagination rewriter as a `Pagination` value next to the compiled SQL.

use crate::models::{CompiledQuery, Pagination, QueryRequest};

/// Placeholder in statement text replaced by the configured table prefix
pub const PREFIX_TOKEN: &str = "{prefix}";

/// How a request's limit/offset pair is expressed for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitClause {
    /// Nothing to add
    None,
    /// Native clause appended to the statement
    Native(String),
    /// Emulated downstream with a ranking column
    Deferred(Pagination),
}

pub struct QueryTranslator {
    table_prefix: String,
}

impl QueryTranslator {
    pub fn new(table_prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: table_prefix.into(),
        }
    }

    /// Expand every `{prefix}` token, so `FROM {prefix}events` reads
    /// `FROM prod_events` under prefix `prod_`
    pub fn apply_prefix(&self, sql: &str) -> String {
        sql.replace(PREFIX_TOKEN, &self.table_prefix)
    }

    pub fn compile_limit(&self, limit: Option<u64>, offset: Option<u64>) -> LimitClause {
        match (limit, offset) {
            // Any offset defers the window, with or without a limit
            (limit, Some(offset)) => LimitClause::Deferred(Pagination::new(limit, offset)),
            (Some(limit), None) => LimitClause::Native(format!("LIMIT {}", limit)),
            (None, None) => LimitClause::None,
        }
    }

    pub fn compile(&self, request: QueryRequest) -> CompiledQuery {
        let QueryRequest {
            sql,
            bindings,
            limit,
            offset,
        } = request;
        let sql = self.apply_prefix(&sql);

        match self.compile_limit(limit, offset) {
            LimitClause::None => CompiledQuery {
                sql,
                bindings,
                pagination: None,
            },
            LimitClause::Native(clause) => CompiledQuery {
                sql: format!("{} {}", trim_statement(&sql), clause),
                bindings,
                pagination: None,
            },
            LimitClause::Deferred(pagination) => {
                tracing::debug!(
                    "Deferring LIMIT {:?} OFFSET {} to the pagination rewriter",
                    pagination.limit,
                    pagination.offset
                );
                CompiledQuery {
                    sql,
                    bindings,
                    pagination: Some(pagination),
                }
            }
        }
    }
}

impl Default for QueryTranslator {
    fn default() -> Self {
        Self::new("")
    }
}

/// Statement text without trailing whitespace or terminators
pub(crate) fn trim_statement(sql: &str) -> &str {
    sql.trim_end().trim_end_matches(';').trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_without_offset_is_native() {
        let translator = QueryTranslator::default();
        let compiled = translator.compile(QueryRequest::new("SELECT * FROM events;").limit(5));

        assert_eq!(compiled.sql, "SELECT * FROM events LIMIT 5");
        assert!(compiled.pagination.is_none());
    }

    #[test]
    fn test_limit_with_offset_is_deferred() {
        let translator = QueryTranslator::default();
        let compiled = translator.compile(
            QueryRequest::new("SELECT *, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM events")
                .limit(10)
                .offset(20),
        );

        assert!(!compiled.sql.contains("LIMIT"));
        assert_eq!(compiled.pagination, Some(Pagination::new(Some(10), 20)));
    }

    #[test]
    fn test_offset_alone_is_deferred() {
        let translator = QueryTranslator::default();
        assert_eq!(
            translator.compile_limit(None, Some(30)),
            LimitClause::Deferred(Pagination::new(None, 30))
        );
    }

    #[test]
    fn test_no_limit_no_offset() {
        let translator = QueryTranslator::default();
        let compiled = translator.compile(QueryRequest::new("SELECT 1").bind(1));

        assert_eq!(compiled.sql, "SELECT 1");
        assert_eq!(compiled.bindings.len(), 1);
        assert!(compiled.pagination.is_none());
    }

    #[test]
    fn test_prefix_token_is_expanded() {
        let translator = QueryTranslator::new("prod_");
        let compiled = translator.compile(
            QueryRequest::new("SELECT * FROM {prefix}events JOIN {prefix}users USING (id)").limit(3),
        );

        assert_eq!(
            compiled.sql,
            "SELECT * FROM prod_events JOIN prod_users USING (id) LIMIT 3"
        );
    }

    #[test]
    fn test_empty_prefix_removes_token() {
        let translator = QueryTranslator::default();
        assert_eq!(translator.apply_prefix("SELECT * FROM {prefix}events"), "SELECT * FROM events");
    }
}
