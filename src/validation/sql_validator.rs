use regex::Regex;
use sqlparser::ast::{Expr, Query, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::sync::LazyLock;

/// Alias the pagination window filters on
pub const RANKING_ALIAS: &str = "rn";

static RANK_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(row_number|rank|dense_rank)\s*\(\s*\)\s*over\b").expect("valid regex")
});

static RANK_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\)\s*(as\s+)?[`"]?rn[`"]?(\s|,|$)"#).expect("valid regex")
});

/// SQL checks run before a statement leaves for the engine
pub struct SqlValidator;

impl SqlValidator {
    /// Check that the statement selects a window function aliased `rn`.
    ///
    /// Uses the AST when the statement parses and falls back to a textual
    /// match for engine syntax the parser does not know.
    pub fn has_ranking_column(sql: &str) -> bool {
        let dialect = GenericDialect {};
        match Parser::parse_sql(&dialect, sql) {
            Ok(statements) => statements.iter().any(Self::statement_has_ranking_column),
            Err(e) => {
                tracing::debug!("Falling back to textual ranking column check: {}", e);
                Self::has_ranking_column_text(sql)
            }
        }
    }

    fn has_ranking_column_text(sql: &str) -> bool {
        RANK_FUNCTION.is_match(sql) && RANK_ALIAS.is_match(sql)
    }

    fn statement_has_ranking_column(stmt: &Statement) -> bool {
        match stmt {
            Statement::Query(query) => Self::query_has_ranking_column(query),
            _ => false,
        }
    }

    fn query_has_ranking_column(query: &Query) -> bool {
        let in_ctes = query.with.as_ref().is_some_and(|with| {
            with.cte_tables
                .iter()
                .any(|cte| Self::query_has_ranking_column(&cte.query))
        });

        in_ctes || Self::set_expr_has_ranking_column(&query.body)
    }

    fn set_expr_has_ranking_column(body: &SetExpr) -> bool {
        match body {
            SetExpr::Select(select) => {
                select.projection.iter().any(Self::is_ranking_item)
                    || select.from.iter().any(Self::table_has_ranking_column)
            }
            SetExpr::Query(query) => Self::query_has_ranking_column(query),
            SetExpr::SetOperation { left, right, .. } => {
                Self::set_expr_has_ranking_column(left) || Self::set_expr_has_ranking_column(right)
            }
            _ => false,
        }
    }

    fn table_has_ranking_column(table: &TableWithJoins) -> bool {
        Self::factor_has_ranking_column(&table.relation)
            || table
                .joins
                .iter()
                .any(|join| Self::factor_has_ranking_column(&join.relation))
    }

    fn factor_has_ranking_column(factor: &TableFactor) -> bool {
        match factor {
            TableFactor::Derived { subquery, .. } => Self::query_has_ranking_column(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => Self::table_has_ranking_column(table_with_joins),
            _ => false,
        }
    }

    fn is_ranking_item(item: &SelectItem) -> bool {
        match item {
            SelectItem::ExprWithAlias {
                expr: Expr::Function(function),
                alias,
                ..
            } => alias.value.eq_ignore_ascii_case(RANKING_ALIAS) && function.over.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_column_in_select_list() {
        assert!(SqlValidator::has_ranking_column(
            "SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM events"
        ));
        assert!(SqlValidator::has_ranking_column(
            "SELECT id, rank() over (partition by region order by id) rn FROM events"
        ));
    }

    #[test]
    fn test_missing_ranking_column() {
        assert!(!SqlValidator::has_ranking_column("SELECT * FROM events"));

        // Not a window function
        assert!(!SqlValidator::has_ranking_column("SELECT id AS rn FROM events"));

        // Window function with another alias
        assert!(!SqlValidator::has_ranking_column(
            "SELECT ROW_NUMBER() OVER (ORDER BY id) AS row_num FROM events"
        ));
    }

    #[test]
    fn test_ranking_column_in_subquery_and_cte() {
        assert!(SqlValidator::has_ranking_column(
            "SELECT * FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM events) t"
        ));
        assert!(SqlValidator::has_ranking_column(
            "WITH ranked AS (SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM events) \
             SELECT * FROM ranked"
        ));
    }

    #[test]
    fn test_textual_fallback() {
        // Unparseable engine-specific tail still gets checked textually
        let sql = "SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM events TABLESAMPLE ???";
        assert!(SqlValidator::has_ranking_column_text(sql));
        assert!(!SqlValidator::has_ranking_column_text("SELECT ??? FROM events"));
    }
}
