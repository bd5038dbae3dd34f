//! SQL for the report views over `fact_transactions`.
//!
//! Every view is built as a `sea-query` [`SelectStatement`] and rendered by
//! the store backend. Aggregates are cast to `DOUBLE PRECISION` so both
//! PostgreSQL and SQLite hand back plain floats.

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use guard_core::error::{GuardError, Result};
use sea_query::{Alias, Expr, Iden, Order, Query, SelectStatement, SimpleExpr};
use serde::Serialize;

/// Rows returned by the state summary.
pub const STATE_SUMMARY_LIMIT: u64 = 20;

/// Default leaderboard threshold and length.
pub const DEFAULT_MIN_TXNS: u64 = 50;
pub const DEFAULT_LEADERBOARD_LIMIT: u64 = 15;

/// Accepted leaderboard threshold and length.
pub const MIN_TXNS_RANGE: RangeInclusive<u64> = 10..=200;
pub const LEADERBOARD_LIMIT_RANGE: RangeInclusive<u64> = 5..=50;

const TXN_COUNT: &str = "COUNT(*)";
const ERROR_COUNT: &str = "COUNT(*) FILTER (WHERE errors IS NOT NULL AND TRIM(errors) <> '')";
const ERROR_RATE: &str = "CAST(COUNT(*) FILTER (WHERE errors IS NOT NULL AND TRIM(errors) <> '') \
                          AS DOUBLE PRECISION) / NULLIF(COUNT(*), 0)";
const TOTAL_AMOUNT: &str = "CAST(SUM(amount) AS DOUBLE PRECISION)";
const AVG_AMOUNT: &str = "CAST(AVG(amount) AS DOUBLE PRECISION)";
const MERCHANT_ID: &str = "CAST(merchant_id AS BIGINT)";

#[derive(Iden)]
pub enum FactTransactions {
    Table,
    DateKey,
    Amount,
    Errors,
    MerchantId,
    MerchantState,
}

/// Inclusive date range plus an optional merchant-state set.
///
/// States are trimmed, de-duplicated and sorted, so two filters naming the
/// same states compare (and hash) equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReportFilter {
    start: NaiveDate,
    end: NaiveDate,
    states: Vec<String>,
}

impl ReportFilter {
    pub fn new<I, S>(start: NaiveDate, end: NaiveDate, states: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if start > end {
            return Err(GuardError::InvalidFilter(format!(
                "start date {start} is after end date {end}"
            )));
        }

        let mut states: Vec<String> = states
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        states.sort();
        states.dedup();

        Ok(Self { start, end, states })
    }

    /// One day, all states.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
            states: Vec::new(),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Selected states; empty means all.
    pub fn states(&self) -> &[String] {
        &self.states
    }
}

/// Leaderboard threshold and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LeaderboardParams {
    /// Minimum transactions for a merchant to be ranked.
    pub min_txns: u64,
    /// Maximum merchants returned.
    pub limit: u64,
}

impl LeaderboardParams {
    pub fn new(min_txns: u64, limit: u64) -> Result<Self> {
        if !MIN_TXNS_RANGE.contains(&min_txns) {
            return Err(GuardError::InvalidFilter(format!(
                "min_txns must be between {} and {}, got {min_txns}",
                MIN_TXNS_RANGE.start(),
                MIN_TXNS_RANGE.end()
            )));
        }
        if !LEADERBOARD_LIMIT_RANGE.contains(&limit) {
            return Err(GuardError::InvalidFilter(format!(
                "limit must be between {} and {}, got {limit}",
                LEADERBOARD_LIMIT_RANGE.start(),
                LEADERBOARD_LIMIT_RANGE.end()
            )));
        }
        Ok(Self { min_txns, limit })
    }
}

impl Default for LeaderboardParams {
    fn default() -> Self {
        Self {
            min_txns: DEFAULT_MIN_TXNS,
            limit: DEFAULT_LEADERBOARD_LIMIT,
        }
    }
}

/// Builds view queries against one fact table location.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    schema: Option<String>,
    day: Option<String>,
}

impl QueryBuilder {
    /// `schema` qualifies `fact_transactions`; `None` uses the search path.
    pub fn new(schema: Option<&str>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            day: None,
        }
    }

    /// Use `expr` as the calendar day of a row instead of the bare
    /// `date_key` column. Needed when `date_key` holds timestamps.
    pub fn with_day_expr(mut self, expr: impl Into<String>) -> Self {
        self.day = Some(expr.into());
        self
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn day_expr(&self) -> Option<&str> {
        self.day.as_deref()
    }

    /// Count, total amount and error count over the filter.
    pub fn kpis(&self, filter: &ReportFilter) -> SelectStatement {
        let mut q = self.filtered(filter);
        q.expr_as(Expr::cust(TXN_COUNT), Alias::new("txn_count"))
            .expr_as(Expr::cust(TOTAL_AMOUNT), Alias::new("total_amount"))
            .expr_as(Expr::cust(ERROR_COUNT), Alias::new("error_count"));
        q
    }

    /// One row per day in range, ascending.
    pub fn timeseries(&self, filter: &ReportFilter) -> SelectStatement {
        let mut q = self.filtered(filter);
        q.expr_as(self.day(), Alias::new("date_key"))
            .expr_as(Expr::cust(TXN_COUNT), Alias::new("txn_count"))
            .expr_as(Expr::cust(TOTAL_AMOUNT), Alias::new("total_amount"))
            .expr_as(Expr::cust(ERROR_COUNT), Alias::new("error_count"))
            .expr_as(Expr::cust(ERROR_RATE), Alias::new("error_rate"))
            .add_group_by([self.day()])
            .order_by_expr(self.day(), Order::Asc);
        q
    }

    /// Riskiest merchants with at least `params.min_txns` transactions.
    pub fn leaderboard(&self, filter: &ReportFilter, params: LeaderboardParams) -> SelectStatement {
        let mut q = self.filtered(filter);
        q.expr_as(Expr::cust(MERCHANT_ID), Alias::new("merchant_id"))
            .column(FactTransactions::MerchantState)
            .expr_as(Expr::cust(TXN_COUNT), Alias::new("txn_count"))
            .expr_as(Expr::cust(TOTAL_AMOUNT), Alias::new("total_spent"))
            .expr_as(Expr::cust(AVG_AMOUNT), Alias::new("avg_amount"))
            .expr_as(Expr::cust(ERROR_COUNT), Alias::new("error_count"))
            .expr_as(Expr::cust(ERROR_RATE), Alias::new("error_rate"))
            .group_by_col(FactTransactions::MerchantId)
            .group_by_col(FactTransactions::MerchantState)
            .and_having(Expr::expr(Expr::cust(TXN_COUNT)).gte(params.min_txns))
            .order_by(Alias::new("error_rate"), Order::Desc)
            .order_by(Alias::new("txn_count"), Order::Desc)
            .order_by(FactTransactions::MerchantId, Order::Asc)
            .limit(params.limit);
        q
    }

    /// Spend per merchant state, top [`STATE_SUMMARY_LIMIT`].
    pub fn state_summary(&self, filter: &ReportFilter) -> SelectStatement {
        let mut q = self.filtered(filter);
        q.column(FactTransactions::MerchantState)
            .expr_as(Expr::cust(TXN_COUNT), Alias::new("txn_count"))
            .expr_as(Expr::cust(TOTAL_AMOUNT), Alias::new("total_spent"))
            .expr_as(Expr::cust(ERROR_COUNT), Alias::new("error_count"))
            .expr_as(Expr::cust(ERROR_RATE), Alias::new("error_rate"))
            .group_by_col(FactTransactions::MerchantState)
            .order_by(Alias::new("total_spent"), Order::Desc)
            .limit(STATE_SUMMARY_LIMIT);
        q
    }

    /// Earliest and latest day in the table.
    pub fn date_bounds(&self) -> SelectStatement {
        let mut q = self.fact_select();
        q.expr_as(Expr::expr(self.day()).min(), Alias::new("min_date"))
            .expr_as(Expr::expr(self.day()).max(), Alias::new("max_date"));
        q
    }

    /// Distinct non-null merchant states, sorted.
    pub fn states(&self) -> SelectStatement {
        let mut q = self.fact_select();
        q.distinct()
            .column(FactTransactions::MerchantState)
            .and_where(Expr::col(FactTransactions::MerchantState).is_not_null())
            .order_by(FactTransactions::MerchantState, Order::Asc);
        q
    }

    fn day(&self) -> SimpleExpr {
        match &self.day {
            Some(expr) => Expr::cust(expr.as_str()),
            None => Expr::col(FactTransactions::DateKey).into(),
        }
    }

    fn fact_select(&self) -> SelectStatement {
        let mut q = Query::select();
        match &self.schema {
            Some(schema) => q.from((Alias::new(schema.as_str()), FactTransactions::Table)),
            None => q.from(FactTransactions::Table),
        };
        q
    }

    fn filtered(&self, filter: &ReportFilter) -> SelectStatement {
        let mut q = self.fact_select();
        q.and_where(Expr::expr(self.day()).between(filter.start, filter.end));
        if !filter.states.is_empty() {
            q.and_where(
                Expr::col(FactTransactions::MerchantState).is_in(filter.states.iter().cloned()),
            );
        }
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{PostgresQueryBuilder, SqliteQueryBuilder};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn january(states: &[&str]) -> ReportFilter {
        ReportFilter::new(date(2019, 1, 1), date(2019, 1, 31), states.iter().copied()).unwrap()
    }

    // ── filter ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_filter_rejects_inverted_range() {
        let err = ReportFilter::new(date(2019, 2, 1), date(2019, 1, 1), Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidFilter(_)));
    }

    #[test]
    fn test_filter_states_normalized() {
        let a = january(&["NY", " CA", "NY", ""]);
        let b = january(&["CA", "NY"]);
        assert_eq!(a.states(), &["CA".to_string(), "NY".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_day_filter() {
        let f = ReportFilter::day(date(2019, 3, 4));
        assert_eq!(f.start(), f.end());
        assert!(f.states().is_empty());
    }

    #[test]
    fn test_leaderboard_params_ranges() {
        assert_eq!(
            LeaderboardParams::new(50, 15).unwrap(),
            LeaderboardParams::default()
        );
        assert!(LeaderboardParams::new(9, 15).is_err());
        assert!(LeaderboardParams::new(10, 51).is_err());
        assert!(LeaderboardParams::new(200, 5).is_ok());
    }

    // ── rendering ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_schema_qualifies_table() {
        let qb = QueryBuilder::new(Some("analytics_warehouse"));
        let sql = qb.kpis(&january(&[])).to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#"FROM "analytics_warehouse"."fact_transactions""#));
        assert!(sql.contains(r#""date_key" BETWEEN '2019-01-01' AND '2019-01-31'"#));
        assert!(!sql.contains("IN ("));
    }

    #[test]
    fn test_no_schema() {
        let sql = QueryBuilder::new(None)
            .states()
            .to_string(SqliteQueryBuilder);
        assert!(sql.starts_with(r#"SELECT DISTINCT "merchant_state" FROM "fact_transactions""#));
    }

    #[test]
    fn test_state_filter_rendered() {
        let sql = QueryBuilder::default()
            .kpis(&january(&["TX", "CA"]))
            .to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#""merchant_state" IN ('CA', 'TX')"#));
    }

    #[test]
    fn test_leaderboard_clauses() {
        let sql = QueryBuilder::default()
            .leaderboard(
                &january(&[]),
                LeaderboardParams {
                    min_txns: 25,
                    limit: 5,
                },
            )
            .to_string(PostgresQueryBuilder);
        assert!(sql.contains("HAVING"));
        assert!(sql.contains(">= 25"));
        assert!(sql.contains(
            r#"ORDER BY "error_rate" DESC, "txn_count" DESC, "merchant_id" ASC LIMIT 5"#
        ));
    }

    #[test]
    fn test_state_summary_limit() {
        let sql = QueryBuilder::default()
            .state_summary(&january(&[]))
            .to_string(PostgresQueryBuilder);
        assert!(sql.ends_with(r#"ORDER BY "total_spent" DESC LIMIT 20"#));
    }

    #[test]
    fn test_day_expression_replaces_column() {
        let qb = QueryBuilder::new(None).with_day_expr("DATE(date_key)");
        let filter = january(&[]);

        let series = qb.timeseries(&filter).to_string(SqliteQueryBuilder);
        assert!(series.starts_with(r#"SELECT DATE(date_key) AS "date_key""#));
        assert!(series.contains("BETWEEN '2019-01-01' AND '2019-01-31'"));
        assert!(series.contains("GROUP BY DATE(date_key) ORDER BY DATE(date_key) ASC"));
        assert_eq!(series.matches("DATE(date_key)").count(), 4);
        assert!(!series.contains(r#""date_key" BETWEEN"#));

        let bounds = qb.date_bounds().to_string(SqliteQueryBuilder);
        assert!(bounds.contains(r#"MIN(DATE(date_key)) AS "min_date""#));
    }

    #[test]
    fn test_schema_name_is_quoted() {
        let qb = QueryBuilder::new(Some(r#"odd"name"#));
        let sql = qb.date_bounds().to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#""odd""name"."fact_transactions""#));
    }
}
