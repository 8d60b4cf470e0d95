//! Postgres-backed store implementations.
//!
//! Expected schema (owned by the platform's migration pipeline, not this
//! service):
//! - creators(id uuid pk, username text, display_name text null,
//!   creator_score float8, rising_score float8, recipe_count int8,
//!   avg_rating float8, follower_count int8, total_likes int8,
//!   total_comments int8, total_saves int8, days_active int8,
//!   updated_at timestamptz)
//! - recipes(id uuid pk, creator_id uuid, rating float8 null,
//!   likes_count int8, comments_count int8, saves_count int8,
//!   created_at timestamptz)
//! - follows(follower_id uuid, followee_id uuid)
//! - creator_stats_snapshots(id int8 pk, creator_id uuid, recipe_count int8,
//!   avg_rating float8, follower_count int8, total_likes int8,
//!   total_comments int8, total_saves int8, days_active int8,
//!   created_at timestamptz)

use crate::error::Result;
use crate::models::{CreatorRecord, CreatorRow, CreatorStatistics, RecipeRow, StatisticsSnapshot};
use crate::store::{CreatorStore, SnapshotStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

type CreatorRecordRow = (
    Uuid,
    String,
    Option<String>,
    f64,
    f64,
    i64,
    f64,
    i64,
    i64,
    i64,
    i64,
    i64,
    DateTime<Utc>,
);

fn record_from_row(row: CreatorRecordRow) -> CreatorRecord {
    CreatorRecord {
        creator_id: row.0,
        username: row.1,
        display_name: row.2,
        creator_score: row.3,
        rising_score: row.4,
        stats: CreatorStatistics {
            recipe_count: row.5,
            avg_rating: row.6,
            follower_count: row.7,
            total_likes: row.8,
            total_comments: row.9,
            total_saves: row.10,
            days_active: row.11,
        },
        updated_at: row.12,
    }
}

const RECORD_COLUMNS: &str = "id, username, display_name, creator_score, rising_score, \
     recipe_count, avg_rating, follower_count, total_likes, total_comments, \
     total_saves, days_active, updated_at";

pub struct PgCreatorStore {
    pool: PgPool,
}

impl PgCreatorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreatorStore for PgCreatorStore {
    async fn fetch_creator_roster(&self) -> Result<Vec<CreatorRow>> {
        let rows: Vec<(Uuid, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT c.id, c.username, c.display_name, MAX(r.created_at) AS last_active_at
             FROM creators c
             JOIN recipes r ON r.creator_id = c.id
             GROUP BY c.id, c.username, c.display_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(creator_id, username, display_name, last_active_at)| CreatorRow {
                creator_id,
                username,
                display_name,
                last_active_at,
            })
            .collect())
    }

    async fn fetch_recipes_since(&self, window_start: DateTime<Utc>) -> Result<Vec<RecipeRow>> {
        let rows: Vec<(Uuid, Option<f64>, i64, i64, i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT creator_id, rating, likes_count, comments_count, saves_count, created_at
             FROM recipes
             WHERE created_at >= $1",
        )
        .bind(window_start)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(creator_id, rating, likes_count, comments_count, saves_count, created_at)| {
                    RecipeRow {
                        creator_id,
                        rating,
                        likes_count,
                        comments_count,
                        saves_count,
                        created_at,
                    }
                },
            )
            .collect())
    }

    async fn fetch_follower_counts(&self) -> Result<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT followee_id, COUNT(*) FROM follows GROUP BY followee_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn upsert_scores(&self, records: &[CreatorRecord]) -> Result<()> {
        // Per-creator independent writes: no creator's update depends on
        // another's, and a partial failure is healed by the next run. The
        // conflict arm only touches job-owned columns; identity fields
        // belong to other subsystems.
        for record in records {
            sqlx::query(
                "INSERT INTO creators
                     (id, username, display_name, creator_score, rising_score,
                      recipe_count, avg_rating, follower_count, total_likes,
                      total_comments, total_saves, days_active, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                 ON CONFLICT (id) DO UPDATE SET
                     creator_score = EXCLUDED.creator_score,
                     rising_score = EXCLUDED.rising_score,
                     recipe_count = EXCLUDED.recipe_count,
                     avg_rating = EXCLUDED.avg_rating,
                     follower_count = EXCLUDED.follower_count,
                     total_likes = EXCLUDED.total_likes,
                     total_comments = EXCLUDED.total_comments,
                     total_saves = EXCLUDED.total_saves,
                     days_active = EXCLUDED.days_active,
                     updated_at = EXCLUDED.updated_at",
            )
            .bind(record.creator_id)
            .bind(&record.username)
            .bind(&record.display_name)
            .bind(record.creator_score)
            .bind(record.rising_score)
            .bind(record.stats.recipe_count)
            .bind(record.stats.avg_rating)
            .bind(record.stats.follower_count)
            .bind(record.stats.total_likes)
            .bind(record.stats.total_comments)
            .bind(record.stats.total_saves)
            .bind(record.stats.days_active)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;
        }

        debug!(count = records.len(), "Persisted creator scores");
        Ok(())
    }

    async fn top_by_score(
        &self,
        limit: i64,
        offset: i64,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<CreatorRecord>> {
        let rows: Vec<CreatorRecordRow> = match updated_after {
            Some(after) => {
                sqlx::query_as(&format!(
                    "SELECT {RECORD_COLUMNS} FROM creators
                     WHERE creator_score > 0 AND updated_at >= $1
                     ORDER BY creator_score DESC, id ASC
                     LIMIT $2 OFFSET $3"
                ))
                .bind(after)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {RECORD_COLUMNS} FROM creators
                     WHERE creator_score > 0
                     ORDER BY creator_score DESC, id ASC
                     LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(record_from_row).collect())
    }

    async fn top_by_rising_score(&self, limit: i64, offset: i64) -> Result<Vec<CreatorRecord>> {
        let rows: Vec<CreatorRecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM creators
             WHERE rising_score > 0
             ORDER BY rising_score DESC, id ASC
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(record_from_row).collect())
    }
}

pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn append_snapshots(&self, snapshots: &[StatisticsSnapshot]) -> Result<()> {
        for snapshot in snapshots {
            sqlx::query(
                "INSERT INTO creator_stats_snapshots
                     (creator_id, recipe_count, avg_rating, follower_count,
                      total_likes, total_comments, total_saves, days_active, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(snapshot.creator_id)
            .bind(snapshot.stats.recipe_count)
            .bind(snapshot.stats.avg_rating)
            .bind(snapshot.stats.follower_count)
            .bind(snapshot.stats.total_likes)
            .bind(snapshot.stats.total_comments)
            .bind(snapshot.stats.total_saves)
            .bind(snapshot.stats.days_active)
            .bind(snapshot.created_at)
            .execute(&self.pool)
            .await?;
        }

        debug!(count = snapshots.len(), "Appended statistics snapshots");
        Ok(())
    }

    async fn find_previous(
        &self,
        creator_id: Uuid,
        since: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<StatisticsSnapshot>> {
        // Earliest in range, then insertion order on equal timestamps.
        let row: Option<(Uuid, i64, f64, i64, i64, i64, i64, i64, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT creator_id, recipe_count, avg_rating, follower_count,
                        total_likes, total_comments, total_saves, days_active, created_at
                 FROM creator_stats_snapshots
                 WHERE creator_id = $1 AND created_at >= $2 AND created_at < $3
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1",
            )
            .bind(creator_id)
            .bind(since)
            .bind(before)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(
                creator_id,
                recipe_count,
                avg_rating,
                follower_count,
                total_likes,
                total_comments,
                total_saves,
                days_active,
                created_at,
            )| StatisticsSnapshot {
                creator_id,
                stats: CreatorStatistics {
                    recipe_count,
                    avg_rating,
                    follower_count,
                    total_likes,
                    total_comments,
                    total_saves,
                    days_active,
                },
                created_at,
            },
        ))
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM creator_stats_snapshots WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
