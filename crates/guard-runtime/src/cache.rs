//! TTL cache for report views.
//!
//! Each entry is keyed by the view and every input it depends on, and is
//! served only while younger than the cache's freshness window. Nothing
//! evicts stale entries eagerly; they are overwritten on the next fetch.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use guard_core::settings::DEFAULT_CACHE_TTL_SECS;

use crate::query::{LeaderboardParams, ReportFilter};
use crate::views::{DailyPoint, DateBounds, Kpis, MerchantRow, StateRow};

/// A view plus the inputs that determine its result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    Kpis(ReportFilter),
    Timeseries(ReportFilter),
    Leaderboard(ReportFilter, LeaderboardParams),
    StateSummary(ReportFilter),
    DateBounds,
    States,
}

/// A cached view result.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedView {
    Kpis(Kpis),
    Timeseries(Vec<DailyPoint>),
    Leaderboard(Vec<MerchantRow>),
    StateSummary(Vec<StateRow>),
    DateBounds(DateBounds),
    States(Vec<String>),
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    view: CachedView,
}

/// View results with a fixed freshness window.
///
/// # Example
/// ```
/// use guard_runtime::cache::{CachedView, ReportCache, ViewKey};
///
/// let mut cache = ReportCache::new(600);
/// cache.insert(ViewKey::States, CachedView::States(vec!["CA".into()]));
/// assert!(cache.get(&ViewKey::States).is_some());
/// cache.invalidate();
/// assert!(cache.get(&ViewKey::States).is_none());
/// ```
#[derive(Debug)]
pub struct ReportCache {
    ttl: Duration,
    entries: HashMap<ViewKey, Entry>,
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_SECS)
    }
}

impl ReportCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_ttl(Duration::from_secs(ttl_secs))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached result for `key`, if it is still fresh.
    pub fn get(&self, key: &ViewKey) -> Option<&CachedView> {
        self.entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| &entry.view)
    }

    pub fn insert(&mut self, key: ViewKey, view: CachedView) {
        self.entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                view,
            },
        );
    }

    /// Drop every entry.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        tracing::debug!("report cache invalidated");
    }

    /// Entries held, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn filter(states: &[&str]) -> ReportFilter {
        ReportFilter::new(
            NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 1, 31).unwrap(),
            states.iter().copied(),
        )
        .unwrap()
    }

    #[test]
    fn test_default_ttl() {
        assert_eq!(ReportCache::default().ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_fresh_entry_is_served() {
        let mut cache = ReportCache::new(600);
        let key = ViewKey::Kpis(filter(&[]));
        cache.insert(key.clone(), CachedView::Kpis(Kpis::default()));
        assert_eq!(cache.get(&key), Some(&CachedView::Kpis(Kpis::default())));
    }

    #[test]
    fn test_zero_ttl_never_fresh() {
        let mut cache = ReportCache::with_ttl(Duration::ZERO);
        cache.insert(ViewKey::States, CachedView::States(Vec::new()));
        assert!(cache.get(&ViewKey::States).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_state_order_does_not_split_keys() {
        let mut cache = ReportCache::new(600);
        cache.insert(
            ViewKey::Kpis(filter(&["NY", "CA"])),
            CachedView::Kpis(Kpis::default()),
        );
        assert!(cache.get(&ViewKey::Kpis(filter(&["CA", "NY", "CA"]))).is_some());
        assert!(cache.get(&ViewKey::Kpis(filter(&["CA"]))).is_none());
    }

    #[test]
    fn test_view_params_are_part_of_key() {
        let mut cache = ReportCache::new(600);
        let params = LeaderboardParams::default();
        cache.insert(
            ViewKey::Leaderboard(filter(&[]), params),
            CachedView::Leaderboard(Vec::new()),
        );
        let other = LeaderboardParams {
            min_txns: params.min_txns + 1,
            ..params
        };
        assert!(cache
            .get(&ViewKey::Leaderboard(filter(&[]), other))
            .is_none());
        assert!(cache.get(&ViewKey::Timeseries(filter(&[]))).is_none());
    }

    #[test]
    fn test_invalidate_clears() {
        let mut cache = ReportCache::new(600);
        cache.insert(ViewKey::DateBounds, CachedView::DateBounds(DateBounds::default()));
        cache.invalidate();
        assert!(cache.is_empty());
    }
}
