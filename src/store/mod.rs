//! Store seam for the scoring engine.
//!
//! The engine consumes the persistent store through two traits so the job
//! and query paths stay independent of the backing engine: Postgres in
//! production, in-memory collections for tests and cache-less local runs.

use crate::error::Result;
use crate::models::{CreatorRecord, CreatorRow, RecipeRow, StatisticsSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryCreatorStore, MemorySnapshotStore};
pub use postgres::{PgCreatorStore, PgSnapshotStore};

/// Queryable collection of creators, their recipes, and follower edges,
/// plus the score write-back path.
#[async_trait]
pub trait CreatorStore: Send + Sync {
    /// Every creator with at least one recipe ever, with their most recent
    /// recipe timestamp. Creators with zero in-window activity still
    /// appear on the roster.
    async fn fetch_creator_roster(&self) -> Result<Vec<CreatorRow>>;

    /// Raw recipe rows created at or after `window_start`.
    async fn fetch_recipes_since(&self, window_start: DateTime<Utc>) -> Result<Vec<RecipeRow>>;

    /// Follower count per creator over the full follow relation.
    async fn fetch_follower_counts(&self) -> Result<HashMap<Uuid, i64>>;

    /// Write back scores and embedded statistics. Only the scoring job
    /// calls this; per-creator writes are independent, so partial failure
    /// is recoverable by the next idempotent run.
    async fn upsert_scores(&self, records: &[CreatorRecord]) -> Result<()>;

    /// Creators ordered by `creator_score` descending (ties broken by
    /// ascending creator id), filtered to score > 0 and optionally to
    /// records scored after `updated_after`.
    async fn top_by_score(
        &self,
        limit: i64,
        offset: i64,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<CreatorRecord>>;

    /// Creators ordered by `rising_score` descending (ties broken by
    /// ascending creator id), filtered to rising score > 0.
    async fn top_by_rising_score(&self, limit: i64, offset: i64) -> Result<Vec<CreatorRecord>>;
}

/// Append-only history of per-creator statistics.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append one snapshot per creator for the current run.
    async fn append_snapshots(&self, snapshots: &[StatisticsSnapshot]) -> Result<()>;

    /// The growth baseline for a creator: the EARLIEST snapshot with
    /// `since <= created_at < before`. Earliest-in-range is the
    /// deterministic tie-break when multiple runs fall in the window.
    async fn find_previous(
        &self,
        creator_id: Uuid,
        since: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<StatisticsSnapshot>>;

    /// Delete snapshots older than `cutoff`, returning how many were
    /// removed. Runs at the end of every cycle, unconditionally.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
