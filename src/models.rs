use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version stamped into every cached leaderboard payload. Bump on any change
/// to the cached record shape; readers treat a mismatch as a forced miss.
pub const LEADERBOARD_SCHEMA_VERSION: u32 = 1;

/// Per-creator engagement statistics for one scoring run.
///
/// Ephemeral: recomputed from raw rows every run and embedded into
/// `CreatorRecord` and `StatisticsSnapshot`, never persisted on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatorStatistics {
    /// Recipes created inside the activity window.
    pub recipe_count: i64,
    /// Average rating across in-window rated recipes; 0.0 when none.
    pub avg_rating: f64,
    /// Follower count over the full (unwindowed) follow relation.
    pub follower_count: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_saves: i64,
    /// Distinct UTC calendar dates with at least one in-window recipe.
    pub days_active: i64,
}

/// Scored creator projection as served by the leaderboard views.
///
/// `creator_score`, `rising_score`, `stats` and `updated_at` are written
/// only by the scoring job; identity fields are owned by other subsystems
/// and carried through as a read-only projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorRecord {
    pub creator_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    /// Weighted, time-decayed engagement score. Always >= 0.
    pub creator_score: f64,
    /// Growth score against the prior snapshot baseline. Always >= 0;
    /// 0 means "not rising" or "insufficient history".
    pub rising_score: f64,
    pub stats: CreatorStatistics,
    pub updated_at: DateTime<Utc>,
}

/// Immutable copy of a creator's statistics at one scoring run.
///
/// Append-only history; deleted only by retention pruning. Serves as the
/// "previous period" input to the rising-score comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub creator_id: Uuid,
    pub stats: CreatorStatistics,
    /// Timestamp of the run that produced this snapshot.
    pub created_at: DateTime<Utc>,
}

/// Versioned cache payload for one leaderboard view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedLeaderboard {
    pub schema_version: u32,
    pub entries: Vec<CreatorRecord>,
    pub cached_at: DateTime<Utc>,
}

impl CachedLeaderboard {
    pub fn new(entries: Vec<CreatorRecord>) -> Self {
        Self {
            schema_version: LEADERBOARD_SCHEMA_VERSION,
            entries,
            cached_at: Utc::now(),
        }
    }
}

/// Creator identity row from the roster query (creators with >= 1 recipe).
#[derive(Debug, Clone)]
pub struct CreatorRow {
    pub creator_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    /// Most recent recipe timestamp, unwindowed. Drives inactivity decay.
    pub last_active_at: DateTime<Utc>,
}

/// Raw per-recipe engagement row fed into the aggregation reduction.
#[derive(Debug, Clone)]
pub struct RecipeRow {
    pub creator_id: Uuid,
    /// None for recipes that have never been rated.
    pub rating: Option<f64>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub saves_count: i64,
    pub created_at: DateTime<Utc>,
}
