//! Redis-backed cache for the two leaderboard views.
//!
//! The cache is advisory: every operation is wrapped so a transport failure
//! degrades to a miss or a no-op at the call site, never an error surfaced
//! to query callers. Keys:
//! - leaderboard:top              → serialized CachedLeaderboard
//! - leaderboard:top:{days}d      → time-range-filtered top view
//! - leaderboard:rising           → serialized CachedLeaderboard

use crate::error::{LeaderboardError, Result};
use crate::models::{CachedLeaderboard, LEADERBOARD_SCHEMA_VERSION};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const TOP_VIEW_KEY: &str = "leaderboard:top";
pub const RISING_VIEW_KEY: &str = "leaderboard:rising";
const KEY_PATTERN: &str = "leaderboard:*";

/// Cache key for the top view, optionally parameterized by a recency filter.
pub fn top_view_key(time_range_days: Option<i64>) -> String {
    match time_range_days {
        Some(days) => format!("{}:{}d", TOP_VIEW_KEY, days),
        None => TOP_VIEW_KEY.to_string(),
    }
}

/// Decode a cached payload, enforcing the schema version.
///
/// A payload that fails to parse or carries a different version is a forced
/// miss, never served as-is.
fn decode_view(json: &str) -> Option<CachedLeaderboard> {
    match serde_json::from_str::<CachedLeaderboard>(json) {
        Ok(cached) if cached.schema_version == LEADERBOARD_SCHEMA_VERSION => Some(cached),
        Ok(cached) => {
            warn!(
                found = cached.schema_version,
                expected = LEADERBOARD_SCHEMA_VERSION,
                "Cached leaderboard schema version mismatch, treating as miss"
            );
            None
        }
        Err(e) => {
            warn!(error = %e, "Cached leaderboard failed to deserialize, treating as miss");
            None
        }
    }
}

/// Cache seam consumed by the scoring job and the query service.
///
/// Production runs on the Redis-backed `LeaderboardCache`; tests and
/// cache-less local runs use `MemoryViewCache`. Implementations enforce
/// the schema-version rule: an incompatible payload reads as a miss.
#[async_trait]
pub trait ViewCache: Send + Sync {
    async fn get_view(&self, view_key: &str) -> Result<Option<CachedLeaderboard>>;
    async fn put_view(&self, view_key: &str, view: &CachedLeaderboard) -> Result<()>;
    async fn invalidate(&self, view_key: &str) -> Result<()>;
    async fn invalidate_all(&self) -> Result<()>;
}

/// Leaderboard view cache over a shared Redis connection.
#[derive(Clone)]
pub struct LeaderboardCache {
    client: Arc<ConnectionManager>,
    ttl_secs: u64,
}

impl LeaderboardCache {
    pub async fn new(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| LeaderboardError::Cache(format!("Failed to create Redis client: {}", e)))?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            LeaderboardError::Cache(format!("Failed to create Redis connection: {}", e))
        })?;

        Ok(Self {
            client: Arc::new(manager),
            ttl_secs,
        })
    }

    /// Check connection health.
    pub async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                LeaderboardError::Cache(format!("Redis health check failed: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ViewCache for LeaderboardCache {
    /// Fetch a cached view. `Ok(None)` covers both a plain miss and an
    /// incompatible payload; `Err` means the transport failed.
    async fn get_view(&self, view_key: &str) -> Result<Option<CachedLeaderboard>> {
        let value: Option<String> = redis::cmd("GET")
            .arg(view_key)
            .query_async(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis GET failed for {}: {}", view_key, e);
                LeaderboardError::Cache(format!("Redis error: {}", e))
            })?;

        match value {
            Some(json) => match decode_view(&json) {
                Some(cached) => {
                    debug!("Cache hit for {}", view_key);
                    Ok(Some(cached))
                }
                None => Ok(None),
            },
            None => {
                debug!("Cache miss for {}", view_key);
                Ok(None)
            }
        }
    }

    /// Store a view with the configured TTL.
    async fn put_view(&self, view_key: &str, view: &CachedLeaderboard) -> Result<()> {
        let json = serde_json::to_string(view)?;

        redis::cmd("SETEX")
            .arg(view_key)
            .arg(self.ttl_secs)
            .arg(&json)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis SETEX failed for {}: {}", view_key, e);
                LeaderboardError::Cache(format!("Redis error: {}", e))
            })?;

        debug!(
            "Cached {} entries at {} with TTL={}s",
            view.entries.len(),
            view_key,
            self.ttl_secs
        );
        Ok(())
    }

    /// Drop a single cached view.
    async fn invalidate(&self, view_key: &str) -> Result<()> {
        redis::cmd("DEL")
            .arg(view_key)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis DEL failed for {}: {}", view_key, e);
                LeaderboardError::Cache(format!("Redis error: {}", e))
            })?;
        Ok(())
    }

    /// Drop every leaderboard view, including parameterized top views.
    ///
    /// Called once at the end of every successful scoring run. Uses SCAN
    /// instead of KEYS to avoid blocking Redis.
    async fn invalidate_all(&self) -> Result<()> {
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(KEY_PATTERN)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut self.client.as_ref().clone())
                .await
                .map_err(|e| {
                    warn!("Redis SCAN failed for {}: {}", KEY_PATTERN, e);
                    LeaderboardError::Cache(format!("Redis error: {}", e))
                })?;

            if !keys.is_empty() {
                redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, ()>(&mut self.client.as_ref().clone())
                    .await
                    .map_err(|e| {
                        warn!("Redis DEL failed: {}", e);
                        LeaderboardError::Cache(format!("Redis error: {}", e))
                    })?;
                total_deleted += keys.len();
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!("Invalidated {} leaderboard cache entries", total_deleted);
        Ok(())
    }
}

/// In-process view cache for tests and cache-less local runs.
///
/// Entries live until invalidated; the advisory-cache semantics and the
/// schema-version forced miss match the Redis implementation.
#[derive(Default)]
pub struct MemoryViewCache {
    views: RwLock<HashMap<String, CachedLeaderboard>>,
}

impl MemoryViewCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ViewCache for MemoryViewCache {
    async fn get_view(&self, view_key: &str) -> Result<Option<CachedLeaderboard>> {
        Ok(self
            .views
            .read()
            .await
            .get(view_key)
            .filter(|view| view.schema_version == LEADERBOARD_SCHEMA_VERSION)
            .cloned())
    }

    async fn put_view(&self, view_key: &str, view: &CachedLeaderboard) -> Result<()> {
        self.views
            .write()
            .await
            .insert(view_key.to_string(), view.clone());
        Ok(())
    }

    async fn invalidate(&self, view_key: &str) -> Result<()> {
        self.views.write().await.remove(view_key);
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<()> {
        self.views.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CachedLeaderboard;

    #[test]
    fn top_view_key_encodes_time_range() {
        assert_eq!(top_view_key(None), "leaderboard:top");
        assert_eq!(top_view_key(Some(7)), "leaderboard:top:7d");
    }

    #[test]
    fn decode_accepts_current_schema_version() {
        let view = CachedLeaderboard::new(Vec::new());
        let json = serde_json::to_string(&view).unwrap();
        let decoded = decode_view(&json).unwrap();
        assert_eq!(decoded.schema_version, LEADERBOARD_SCHEMA_VERSION);
        assert!(decoded.entries.is_empty());
    }

    #[test]
    fn decode_rejects_stale_schema_version() {
        let mut view = CachedLeaderboard::new(Vec::new());
        view.schema_version = LEADERBOARD_SCHEMA_VERSION + 1;
        let json = serde_json::to_string(&view).unwrap();
        assert!(decode_view(&json).is_none());
    }

    #[test]
    fn decode_rejects_garbage_payload() {
        assert!(decode_view("not json").is_none());
        assert!(decode_view("{\"unexpected\":true}").is_none());
    }
}
