//! Reporting layer for TransGuard.
//!
//! Builds the KPI, time-series, leaderboard and state views over the
//! `fact_transactions` table and serves them through a TTL cache.

pub mod aggregator;
pub mod cache;
pub mod fact_source;
pub mod query;
pub mod views;

pub use guard_core as core;
pub use guard_data as data;
