// Pagination Rewriting
//
// The engine has no OFFSET. A deferred limit/offset is emulated by wrapping
// the statement and filtering on its `rn` ranking column.

use crate::error::AthenaError;
use crate::models::Pagination;
use crate::services::translator::trim_statement;
use crate::validation::sql_validator::{SqlValidator, RANKING_ALIAS};

pub struct PaginationRewriter;

impl PaginationRewriter {
    /// Produce the executable statement for `sql` and its deferred pagination.
    ///
    /// Backticks are stripped from every result since the engine rejects them.
    pub fn rewrite(sql: &str, pagination: Option<Pagination>) -> Result<String, AthenaError> {
        let statement = match pagination {
            Some(Pagination {
                limit: Some(limit),
                offset,
            }) => Self::window(sql, limit, offset)?,
            Some(Pagination { limit: None, offset }) => {
                tracing::warn!(
                    "OFFSET {} without LIMIT cannot be expressed for this engine, ignoring it",
                    offset
                );
                sql.to_string()
            }
            None => sql.to_string(),
        };

        Ok(Self::strip_identifier_quotes(&statement))
    }

    fn window(sql: &str, limit: u64, offset: u64) -> Result<String, AthenaError> {
        if !SqlValidator::has_ranking_column(sql) {
            return Err(AthenaError::PaginationSyntax(format!(
                "Required `ROW_NUMBER() OVER(...) AS {}` to implement LIMIT with OFFSET",
                RANKING_ALIAS
            )));
        }

        match Pagination::new(Some(limit), offset).row_range() {
            Some((from, to)) => Ok(format!(
                "SELECT * FROM ({}) WHERE {} BETWEEN {} AND {}",
                trim_statement(sql),
                RANKING_ALIAS,
                from,
                to
            )),
            // LIMIT 0 requests no window at all
            None => Ok(sql.to_string()),
        }
    }

    fn strip_identifier_quotes(sql: &str) -> String {
        sql.replace('`', "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANKED: &str = "SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM events";

    #[test]
    fn test_window_for_third_page() {
        let sql = PaginationRewriter::rewrite(RANKED, Some(Pagination::new(Some(10), 20))).unwrap();
        assert_eq!(
            sql,
            format!("SELECT * FROM ({}) WHERE rn BETWEEN 21 AND 30", RANKED)
        );
    }

    #[test]
    fn test_window_for_first_page() {
        let sql = PaginationRewriter::rewrite(RANKED, Some(Pagination::new(Some(25), 0))).unwrap();
        assert!(sql.ends_with("WHERE rn BETWEEN 1 AND 25"));
    }

    #[test]
    fn test_window_ranges() {
        for (limit, offset) in [(1u64, 0u64), (3, 7), (10, 99), (50, 50)] {
            let sql =
                PaginationRewriter::rewrite(RANKED, Some(Pagination::new(Some(limit), offset)))
                    .unwrap();
            let page = offset / limit;
            let expected = format!(
                "rn BETWEEN {} AND {}",
                limit * page + 1,
                limit * (page + 1)
            );
            assert!(sql.ends_with(&expected), "{} does not end with {}", sql, expected);
        }
    }

    #[test]
    fn test_zero_limit_passes_through() {
        let sql = "SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM events \
                   WHERE day BETWEEN 1 AND 5";
        let rewritten =
            PaginationRewriter::rewrite(sql, Some(Pagination::new(Some(0), 20))).unwrap();
        assert_eq!(rewritten, sql);
    }

    #[test]
    fn test_missing_ranking_column_is_rejected() {
        let result = PaginationRewriter::rewrite(
            "SELECT * FROM events",
            Some(Pagination::new(Some(10), 20)),
        );
        assert!(matches!(result, Err(AthenaError::PaginationSyntax(_))));
    }

    #[test]
    fn test_no_pagination_only_strips_backticks() {
        let sql = PaginationRewriter::rewrite("SELECT `id` FROM `events`", None).unwrap();
        assert_eq!(sql, "SELECT id FROM events");
    }

    #[test]
    fn test_offset_without_limit_is_ignored() {
        let sql =
            PaginationRewriter::rewrite("SELECT * FROM events", Some(Pagination::new(None, 20)))
                .unwrap();
        assert_eq!(sql, "SELECT * FROM events");
    }

    #[test]
    fn test_trailing_semicolon_is_dropped_inside_window() {
        let sql = PaginationRewriter::rewrite(
            &format!("{};", RANKED),
            Some(Pagination::new(Some(5), 5)),
        )
        .unwrap();
        assert_eq!(
            sql,
            format!("SELECT * FROM ({}) WHERE rn BETWEEN 6 AND 10", RANKED)
        );
    }
}
