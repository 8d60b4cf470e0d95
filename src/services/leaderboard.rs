//! Read path for the two leaderboard views.
//!
//! Cache-first with a store fallback: the cache is never the source of
//! truth, so a miss, an incompatible payload, or a transport failure all
//! degrade to a direct store query followed by a best-effort refill.

use crate::cache::{top_view_key, ViewCache, RISING_VIEW_KEY};
use crate::error::{LeaderboardError, Result};
use crate::metrics;
use crate::models::{CachedLeaderboard, CreatorRecord};
use crate::store::CreatorStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::warn;

const MAX_TIME_RANGE_DAYS: i64 = 3650;

pub struct LeaderboardService {
    store: Arc<dyn CreatorStore>,
    cache: Option<Arc<dyn ViewCache>>,
    /// Entries held per cached view. Pages reaching past a full-length
    /// cached list fall through to the store.
    leaderboard_size: usize,
}

impl LeaderboardService {
    pub fn new(
        store: Arc<dyn CreatorStore>,
        cache: Option<Arc<dyn ViewCache>>,
        leaderboard_size: usize,
    ) -> Self {
        Self {
            store,
            cache,
            leaderboard_size,
        }
    }

    /// Creators ordered by `creator_score` descending, filtered to score > 0.
    /// `time_range_days` restricts results to records scored within that
    /// many days of now; stale creators are excluded, not re-scored.
    pub async fn top_creators(
        &self,
        limit: i64,
        offset: i64,
        time_range_days: Option<i64>,
    ) -> Result<Vec<CreatorRecord>> {
        validate_pagination(limit, offset)?;
        if let Some(days) = time_range_days {
            if !(1..=MAX_TIME_RANGE_DAYS).contains(&days) {
                return Err(LeaderboardError::InvalidInput(format!(
                    "time_range_days must be between 1 and {}, got {}",
                    MAX_TIME_RANGE_DAYS, days
                )));
            }
        }

        let view_key = top_view_key(time_range_days);
        if let Some(cached) = self.read_cache(&view_key).await {
            if let Some(page) = self.page_from_cached(&cached, limit, offset) {
                return Ok(page);
            }
        }
        metrics::record_cache_fallback("top");

        let updated_after = time_range_days.map(|days| Utc::now() - Duration::days(days));

        if offset.saturating_add(limit) <= self.leaderboard_size as i64 {
            // Fetch the whole view once so the refilled cache can serve
            // subsequent pages too.
            let full = self
                .store
                .top_by_score(self.leaderboard_size as i64, 0, updated_after)
                .await?;
            self.refill_cache(&view_key, &full).await;
            Ok(page_of(&full, limit, offset))
        } else {
            self.store.top_by_score(limit, offset, updated_after).await
        }
    }

    /// Creators ordered by `rising_score` descending, filtered to
    /// rising score > 0.
    pub async fn rising_creators(&self, limit: i64, offset: i64) -> Result<Vec<CreatorRecord>> {
        validate_pagination(limit, offset)?;

        if let Some(cached) = self.read_cache(RISING_VIEW_KEY).await {
            if let Some(page) = self.page_from_cached(&cached, limit, offset) {
                return Ok(page);
            }
        }
        metrics::record_cache_fallback("rising");

        if offset.saturating_add(limit) <= self.leaderboard_size as i64 {
            let full = self
                .store
                .top_by_rising_score(self.leaderboard_size as i64, 0)
                .await?;
            self.refill_cache(RISING_VIEW_KEY, &full).await;
            Ok(page_of(&full, limit, offset))
        } else {
            self.store.top_by_rising_score(limit, offset).await
        }
    }

    async fn read_cache(&self, view_key: &str) -> Option<CachedLeaderboard> {
        let cache = self.cache.as_ref()?;
        match cache.get_view(view_key).await {
            Ok(cached) => cached,
            // Transport failure degrades to a miss; already logged at WARN.
            Err(_) => None,
        }
    }

    /// Slice a page out of a cached view, but only when the cache can
    /// prove the page complete: either the page lies fully inside the
    /// cached entries, or the cached list is shorter than the view bound
    /// and therefore holds the entire result set.
    fn page_from_cached(
        &self,
        cached: &CachedLeaderboard,
        limit: i64,
        offset: i64,
    ) -> Option<Vec<CreatorRecord>> {
        let end = offset.saturating_add(limit);
        if end <= cached.entries.len() as i64 || cached.entries.len() < self.leaderboard_size {
            Some(page_of(&cached.entries, limit, offset))
        } else {
            None
        }
    }

    async fn refill_cache(&self, view_key: &str, entries: &[CreatorRecord]) {
        if let Some(cache) = &self.cache {
            let view = CachedLeaderboard::new(entries.to_vec());
            if let Err(e) = cache.put_view(view_key, &view).await {
                warn!(view_key, error = %e, "Failed to refill leaderboard cache");
            }
        }
    }
}

fn validate_pagination(limit: i64, offset: i64) -> Result<()> {
    if limit < 0 || offset < 0 {
        return Err(LeaderboardError::InvalidInput(format!(
            "limit and offset must be non-negative, got limit={} offset={}",
            limit, offset
        )));
    }
    Ok(())
}

fn page_of(entries: &[CreatorRecord], limit: i64, offset: i64) -> Vec<CreatorRecord> {
    entries
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CachedLeaderboard, CreatorStatistics};
    use crate::store::MemoryCreatorStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(id: u128, creator_score: f64) -> CreatorRecord {
        CreatorRecord {
            creator_id: Uuid::from_u128(id),
            username: format!("creator-{}", id),
            display_name: None,
            creator_score,
            rising_score: 0.0,
            stats: CreatorStatistics::default(),
            updated_at: Utc::now(),
        }
    }

    fn cached(count: u128) -> CachedLeaderboard {
        CachedLeaderboard::new((1..=count).map(|i| record(i, (100 - i) as f64)).collect())
    }

    fn service(leaderboard_size: usize) -> LeaderboardService {
        LeaderboardService::new(Arc::new(MemoryCreatorStore::new()), None, leaderboard_size)
    }

    #[test]
    fn page_inside_cached_entries_is_served() {
        let page = service(10).page_from_cached(&cached(5), 2, 1).unwrap();
        let ids: Vec<Uuid> = page.iter().map(|r| r.creator_id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);
    }

    #[test]
    fn short_cached_list_is_complete_and_serves_clamped_pages() {
        // 3 entries against a view bound of 10: the list holds the whole
        // result set, so pages past its end are provably empty.
        let svc = service(10);
        let page = svc.page_from_cached(&cached(3), 10, 2).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].creator_id, Uuid::from_u128(3));

        let empty = svc.page_from_cached(&cached(3), 10, 5).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn page_past_full_length_cached_list_falls_through() {
        // A full-length list cannot prove anything beyond its bound.
        let svc = service(10);
        assert!(svc.page_from_cached(&cached(10), 5, 8).is_none());
        // Fully inside the same list still serves.
        assert!(svc.page_from_cached(&cached(10), 5, 5).is_some());
    }

    #[test]
    fn extreme_page_bounds_do_not_overflow() {
        let svc = service(10);
        assert!(svc.page_from_cached(&cached(10), i64::MAX, 1).is_none());
        let page = svc.page_from_cached(&cached(3), i64::MAX, i64::MAX - 1);
        assert!(page.unwrap().is_empty());
    }
}
