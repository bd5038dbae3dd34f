//! Where report views are fetched from.
//!
//! [`FactSource`] is the seam the [`Aggregator`](crate::aggregator::Aggregator)
//! queries through; [`SqlFactSource`] runs the [`QueryBuilder`] statements
//! against a [`SqlStore`] pool.

use async_trait::async_trait;
use guard_core::error::{GuardError, Result};
use guard_data::store::{SqlDatabase, SqlStore};

use crate::query::{LeaderboardParams, QueryBuilder, ReportFilter};
use crate::views::{DailyPoint, DateBounds, Kpis, MerchantRow, StateRow};

#[async_trait]
pub trait FactSource: Send + Sync {
    async fn kpis(&self, filter: &ReportFilter) -> Result<Kpis>;

    async fn timeseries(&self, filter: &ReportFilter) -> Result<Vec<DailyPoint>>;

    async fn leaderboard(
        &self,
        filter: &ReportFilter,
        params: LeaderboardParams,
    ) -> Result<Vec<MerchantRow>>;

    async fn state_summary(&self, filter: &ReportFilter) -> Result<Vec<StateRow>>;

    async fn date_bounds(&self) -> Result<DateBounds>;

    async fn states(&self) -> Result<Vec<String>>;
}

/// Fact views read from a relational store.
pub struct SqlFactSource<DB: SqlDatabase> {
    store: SqlStore<DB>,
    queries: QueryBuilder,
}

impl<DB: SqlDatabase> SqlFactSource<DB> {
    /// Days are taken through the backend's day function, so a timestamp
    /// `date_key` groups and filters by calendar day.
    pub fn new(store: SqlStore<DB>, queries: QueryBuilder) -> Self {
        Self {
            store,
            queries: queries.with_day_expr(DB::day_of(DATE_KEY)),
        }
    }

    pub fn store(&self) -> &SqlStore<DB> {
        &self.store
    }

    pub fn queries(&self) -> &QueryBuilder {
        &self.queries
    }
}

const DATE_KEY: &str = "date_key";

fn query_error(view: &'static str) -> impl Fn(sqlx::Error) -> GuardError {
    move |source| GuardError::Query {
        view,
        source: Box::new(source),
    }
}

fn count(value: i64) -> u64 {
    value.max(0) as u64
}

macro_rules! impl_fact_source {
    ($db_type:ty) => {
        #[async_trait]
        impl FactSource for SqlFactSource<$db_type> {
            async fn kpis(&self, filter: &ReportFilter) -> Result<Kpis> {
                use sqlx::Row;

                let err = query_error("kpis");
                let sql = <$db_type>::build_select(self.queries.kpis(filter));
                let row = sqlx::query(&sql)
                    .fetch_one(self.store.pool())
                    .await
                    .map_err(&err)?;

                Ok(Kpis {
                    txn_count: count(row.try_get("txn_count").map_err(&err)?),
                    total_amount: row
                        .try_get::<Option<f64>, _>("total_amount")
                        .map_err(&err)?
                        .unwrap_or(0.0),
                    error_count: count(row.try_get("error_count").map_err(&err)?),
                })
            }

            async fn timeseries(&self, filter: &ReportFilter) -> Result<Vec<DailyPoint>> {
                use sqlx::Row;

                let err = query_error("timeseries");
                let sql = <$db_type>::build_select(self.queries.timeseries(filter));
                let rows = sqlx::query(&sql)
                    .fetch_all(self.store.pool())
                    .await
                    .map_err(&err)?;

                rows.iter()
                    .map(|row| -> std::result::Result<DailyPoint, sqlx::Error> {
                        Ok(DailyPoint {
                            date: row.try_get("date_key")?,
                            txn_count: count(row.try_get("txn_count")?),
                            total_amount: row
                                .try_get::<Option<f64>, _>("total_amount")?
                                .unwrap_or(0.0),
                            error_count: count(row.try_get("error_count")?),
                            error_rate: row.try_get("error_rate")?,
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(&err)
            }

            async fn leaderboard(
                &self,
                filter: &ReportFilter,
                params: LeaderboardParams,
            ) -> Result<Vec<MerchantRow>> {
                use sqlx::Row;

                let err = query_error("leaderboard");
                let sql = <$db_type>::build_select(self.queries.leaderboard(filter, params));
                let rows = sqlx::query(&sql)
                    .fetch_all(self.store.pool())
                    .await
                    .map_err(&err)?;

                rows.iter()
                    .map(|row| -> std::result::Result<MerchantRow, sqlx::Error> {
                        Ok(MerchantRow {
                            merchant_id: row.try_get("merchant_id")?,
                            merchant_state: row.try_get("merchant_state")?,
                            txn_count: count(row.try_get("txn_count")?),
                            total_spent: row
                                .try_get::<Option<f64>, _>("total_spent")?
                                .unwrap_or(0.0),
                            avg_amount: row
                                .try_get::<Option<f64>, _>("avg_amount")?
                                .unwrap_or(0.0),
                            error_count: count(row.try_get("error_count")?),
                            error_rate: row.try_get("error_rate")?,
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(&err)
            }

            async fn state_summary(&self, filter: &ReportFilter) -> Result<Vec<StateRow>> {
                use sqlx::Row;

                let err = query_error("state_summary");
                let sql = <$db_type>::build_select(self.queries.state_summary(filter));
                let rows = sqlx::query(&sql)
                    .fetch_all(self.store.pool())
                    .await
                    .map_err(&err)?;

                rows.iter()
                    .map(|row| -> std::result::Result<StateRow, sqlx::Error> {
                        Ok(StateRow {
                            merchant_state: row.try_get("merchant_state")?,
                            txn_count: count(row.try_get("txn_count")?),
                            total_spent: row
                                .try_get::<Option<f64>, _>("total_spent")?
                                .unwrap_or(0.0),
                            error_count: count(row.try_get("error_count")?),
                            error_rate: row.try_get("error_rate")?,
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(&err)
            }

            async fn date_bounds(&self) -> Result<DateBounds> {
                use sqlx::Row;

                let err = query_error("date_bounds");
                let sql = <$db_type>::build_select(self.queries.date_bounds());
                let row = sqlx::query(&sql)
                    .fetch_one(self.store.pool())
                    .await
                    .map_err(&err)?;

                Ok(DateBounds {
                    min: row.try_get("min_date").map_err(&err)?,
                    max: row.try_get("max_date").map_err(&err)?,
                })
            }

            async fn states(&self) -> Result<Vec<String>> {
                use sqlx::Row;

                let err = query_error("states");
                let sql = <$db_type>::build_select(self.queries.states());
                let rows = sqlx::query(&sql)
                    .fetch_all(self.store.pool())
                    .await
                    .map_err(&err)?;

                rows.iter()
                    .map(|row| row.try_get::<String, _>("merchant_state"))
                    .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
                    .map_err(&err)
            }
        }
    };
}

impl_fact_source!(guard_data::store::postgres::Postgres);
impl_fact_source!(guard_data::store::sqlite::Sqlite);

// ── Tests ─────────────────────────────────────────────────────────────────────
