//! In-memory store implementations.
//!
//! Used by the integration suites and for cache-less local runs. Behavior
//! mirrors the Postgres implementations, including the earliest-in-range
//! snapshot baseline and the ordering tie-breaks.

use crate::error::{LeaderboardError, Result};
use crate::models::{
    CreatorRecord, CreatorRow, CreatorStatistics, RecipeRow, StatisticsSnapshot,
};
use crate::store::{CreatorStore, SnapshotStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

fn by_score_desc_then_id(score_a: f64, score_b: f64, id_a: Uuid, id_b: Uuid) -> Ordering {
    score_b
        .partial_cmp(&score_a)
        .unwrap_or(Ordering::Equal)
        .then(id_a.cmp(&id_b))
}

fn paginate(records: Vec<CreatorRecord>, limit: i64, offset: i64) -> Vec<CreatorRecord> {
    records
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[derive(Default)]
pub struct MemoryCreatorStore {
    creators: RwLock<HashMap<Uuid, CreatorRecord>>,
    recipes: RwLock<Vec<RecipeRow>>,
    follower_counts: RwLock<HashMap<Uuid, i64>>,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
}

impl MemoryCreatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a creator identity with zero scores, as if never scored.
    pub async fn add_creator(&self, creator_id: Uuid, username: &str) {
        self.creators.write().await.insert(
            creator_id,
            CreatorRecord {
                creator_id,
                username: username.to_string(),
                display_name: None,
                creator_score: 0.0,
                rising_score: 0.0,
                stats: CreatorStatistics::default(),
                updated_at: Utc::now(),
            },
        );
    }

    pub async fn add_recipe(&self, recipe: RecipeRow) {
        self.recipes.write().await.push(recipe);
    }

    pub async fn set_follower_count(&self, creator_id: Uuid, count: i64) {
        self.follower_counts.write().await.insert(creator_id, count);
    }

    pub async fn get_creator(&self, creator_id: Uuid) -> Option<CreatorRecord> {
        self.creators.read().await.get(&creator_id).cloned()
    }

    /// Make every subsequent write fail, for persistence-failure scenarios.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    /// Slow down roster reads, for overlapping-run scenarios.
    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl CreatorStore for MemoryCreatorStore {
    async fn fetch_creator_roster(&self) -> Result<Vec<CreatorRow>> {
        let delay_ms = self.read_delay_ms.load(AtomicOrdering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let creators = self.creators.read().await;
        let recipes = self.recipes.read().await;

        let mut last_active: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        for recipe in recipes.iter() {
            last_active
                .entry(recipe.creator_id)
                .and_modify(|t| *t = (*t).max(recipe.created_at))
                .or_insert(recipe.created_at);
        }

        // Roster membership requires at least one recipe ever.
        let mut roster: Vec<CreatorRow> = creators
            .values()
            .filter_map(|record| {
                last_active.get(&record.creator_id).map(|&last_active_at| CreatorRow {
                    creator_id: record.creator_id,
                    username: record.username.clone(),
                    display_name: record.display_name.clone(),
                    last_active_at,
                })
            })
            .collect();
        roster.sort_by_key(|row| row.creator_id);
        Ok(roster)
    }

    async fn fetch_recipes_since(&self, window_start: DateTime<Utc>) -> Result<Vec<RecipeRow>> {
        Ok(self
            .recipes
            .read()
            .await
            .iter()
            .filter(|r| r.created_at >= window_start)
            .cloned()
            .collect())
    }

    async fn fetch_follower_counts(&self) -> Result<HashMap<Uuid, i64>> {
        Ok(self.follower_counts.read().await.clone())
    }

    async fn upsert_scores(&self, records: &[CreatorRecord]) -> Result<()> {
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(LeaderboardError::Database(
                "simulated write failure".to_string(),
            ));
        }

        let mut creators = self.creators.write().await;
        for record in records {
            creators.insert(record.creator_id, record.clone());
        }
        Ok(())
    }

    async fn top_by_score(
        &self,
        limit: i64,
        offset: i64,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<CreatorRecord>> {
        let creators = self.creators.read().await;
        let mut records: Vec<CreatorRecord> = creators
            .values()
            .filter(|r| r.creator_score > 0.0)
            .filter(|r| updated_after.map_or(true, |after| r.updated_at >= after))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            by_score_desc_then_id(a.creator_score, b.creator_score, a.creator_id, b.creator_id)
        });
        Ok(paginate(records, limit, offset))
    }

    async fn top_by_rising_score(&self, limit: i64, offset: i64) -> Result<Vec<CreatorRecord>> {
        let creators = self.creators.read().await;
        let mut records: Vec<CreatorRecord> = creators
            .values()
            .filter(|r| r.rising_score > 0.0)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            by_score_desc_then_id(a.rising_score, b.rising_score, a.creator_id, b.creator_id)
        });
        Ok(paginate(records, limit, offset))
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<Vec<StatisticsSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<StatisticsSnapshot> {
        self.snapshots.read().await.clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn append_snapshots(&self, snapshots: &[StatisticsSnapshot]) -> Result<()> {
        self.snapshots.write().await.extend_from_slice(snapshots);
        Ok(())
    }

    async fn find_previous(
        &self,
        creator_id: Uuid,
        since: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<StatisticsSnapshot>> {
        let snapshots = self.snapshots.read().await;
        let mut best: Option<&StatisticsSnapshot> = None;
        for snapshot in snapshots.iter() {
            if snapshot.creator_id != creator_id
                || snapshot.created_at < since
                || snapshot.created_at >= before
            {
                continue;
            }
            // Strict comparison keeps insertion order on equal timestamps.
            if best.map_or(true, |b| snapshot.created_at < b.created_at) {
                best = Some(snapshot);
            }
        }
        Ok(best.cloned())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|s| s.created_at >= cutoff);
        Ok((before - snapshots.len()) as u64)
    }
}
