//! Row types returned by the report views.

use chrono::NaiveDate;
use serde::Serialize;

use crate::query::{LeaderboardParams, ReportFilter};

/// Headline totals over a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub txn_count: u64,
    pub total_amount: f64,
    pub error_count: u64,
}

impl Kpis {
    /// Error share in `[0, 1]`; `0` when there are no transactions.
    pub fn error_rate(&self) -> f64 {
        if self.txn_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.txn_count as f64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.txn_count == 0
    }
}

/// One day of the time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub txn_count: u64,
    pub total_amount: f64,
    pub error_count: u64,
    pub error_rate: Option<f64>,
}

/// One merchant on the risk leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantRow {
    pub merchant_id: Option<i64>,
    pub merchant_state: Option<String>,
    pub txn_count: u64,
    pub total_spent: f64,
    pub avg_amount: f64,
    pub error_count: u64,
    pub error_rate: Option<f64>,
}

/// Spend and risk for one merchant state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRow {
    pub merchant_state: Option<String>,
    pub txn_count: u64,
    pub total_spent: f64,
    pub error_count: u64,
    pub error_rate: Option<f64>,
}

/// Date range covered by the fact table; both `None` when it is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateBounds {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

impl DateBounds {
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.min.zip(self.max)
    }
}

/// All four views for one filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub filter: ReportFilter,
    pub leaderboard_params: LeaderboardParams,
    pub kpis: Kpis,
    pub timeseries: Vec<DailyPoint>,
    pub leaderboard: Vec<MerchantRow>,
    pub states: Vec<StateRow>,
}
