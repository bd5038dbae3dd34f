//! Cached access to the report views.

use chrono::NaiveDate;
use guard_core::error::Result;
use tracing::{debug, info};

use crate::cache::{CachedView, ReportCache, ViewKey};
use crate::fact_source::FactSource;
use crate::query::{LeaderboardParams, ReportFilter};
use crate::views::{DailyPoint, DateBounds, Kpis, MerchantRow, Report, StateRow};

/// Serves report views from a [`FactSource`], through a [`ReportCache`].
///
/// Failed fetches are returned to the caller and leave the cache untouched.
pub struct Aggregator<S> {
    source: S,
    cache: ReportCache,
}

impl<S: FactSource> Aggregator<S> {
    pub fn new(source: S, cache: ReportCache) -> Self {
        Self { source, cache }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    /// Drop every cached view.
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub async fn kpis(&mut self, filter: &ReportFilter) -> Result<Kpis> {
        let key = ViewKey::Kpis(filter.clone());
        if let Some(CachedView::Kpis(kpis)) = self.cache.get(&key) {
            debug!("kpis served from cache");
            return Ok(*kpis);
        }

        let kpis = self.source.kpis(filter).await?;
        self.cache.insert(key, CachedView::Kpis(kpis));
        Ok(kpis)
    }

    pub async fn timeseries(&mut self, filter: &ReportFilter) -> Result<Vec<DailyPoint>> {
        let key = ViewKey::Timeseries(filter.clone());
        if let Some(CachedView::Timeseries(points)) = self.cache.get(&key) {
            debug!("timeseries served from cache");
            return Ok(points.clone());
        }

        let points = self.source.timeseries(filter).await?;
        self.cache
            .insert(key, CachedView::Timeseries(points.clone()));
        Ok(points)
    }

    pub async fn leaderboard(
        &mut self,
        filter: &ReportFilter,
        params: LeaderboardParams,
    ) -> Result<Vec<MerchantRow>> {
        let key = ViewKey::Leaderboard(filter.clone(), params);
        if let Some(CachedView::Leaderboard(rows)) = self.cache.get(&key) {
            debug!("leaderboard served from cache");
            return Ok(rows.clone());
        }

        let rows = self.source.leaderboard(filter, params).await?;
        self.cache.insert(key, CachedView::Leaderboard(rows.clone()));
        Ok(rows)
    }

    pub async fn state_summary(&mut self, filter: &ReportFilter) -> Result<Vec<StateRow>> {
        let key = ViewKey::StateSummary(filter.clone());
        if let Some(CachedView::StateSummary(rows)) = self.cache.get(&key) {
            debug!("state summary served from cache");
            return Ok(rows.clone());
        }

        let rows = self.source.state_summary(filter).await?;
        self.cache
            .insert(key, CachedView::StateSummary(rows.clone()));
        Ok(rows)
    }

    pub async fn date_bounds(&mut self) -> Result<DateBounds> {
        if let Some(CachedView::DateBounds(bounds)) = self.cache.get(&ViewKey::DateBounds) {
            return Ok(*bounds);
        }

        let bounds = self.source.date_bounds().await?;
        self.cache
            .insert(ViewKey::DateBounds, CachedView::DateBounds(bounds));
        Ok(bounds)
    }

    pub async fn states(&mut self) -> Result<Vec<String>> {
        if let Some(CachedView::States(states)) = self.cache.get(&ViewKey::States) {
            return Ok(states.clone());
        }

        let states = self.source.states().await?;
        self.cache
            .insert(ViewKey::States, CachedView::States(states.clone()));
        Ok(states)
    }

    /// Build a filter, filling a missing start or end from the fact table's
    /// date bounds.
    ///
    /// Returns `Ok(None)` when a bound is needed but the table is empty.
    pub async fn resolve_filter(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        states: &[String],
    ) -> Result<Option<ReportFilter>> {
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (start, end) => match self.date_bounds().await?.range() {
                Some((min, max)) => (start.unwrap_or(min), end.unwrap_or(max)),
                None => return Ok(None),
            },
        };

        ReportFilter::new(start, end, states).map(Some)
    }

    /// All four views for one filter.
    pub async fn dashboard(
        &mut self,
        filter: &ReportFilter,
        params: LeaderboardParams,
    ) -> Result<Report> {
        info!(
            "Building report for {} to {} ({} states)",
            filter.start(),
            filter.end(),
            if filter.states().is_empty() {
                "all".to_string()
            } else {
                filter.states().join(", ")
            }
        );

        Ok(Report {
            filter: filter.clone(),
            leaderboard_params: params,
            kpis: self.kpis(filter).await?,
            timeseries: self.timeseries(filter).await?,
            leaderboard: self.leaderboard(filter, params).await?,
            states: self.state_summary(filter).await?,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
