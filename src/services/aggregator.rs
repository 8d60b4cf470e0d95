//! Aggregation of raw engagement rows into per-creator statistics.
//!
//! IO and computation are split: the store returns raw rows, and a pure
//! reduction turns them into one immutable `CreatorStatistics` per rostered
//! creator. Creators with zero in-window activity still appear, with zero
//! counts.

use crate::error::{LeaderboardError, Result};
use crate::models::{CreatorRow, CreatorStatistics, RecipeRow};
use crate::store::CreatorStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct StatsAggregator {
    store: Arc<dyn CreatorStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn CreatorStore>) -> Self {
        Self { store }
    }

    /// Produce one statistics record per creator with at least one recipe
    /// ever, scoped to content created within `[now - window_days, now]`.
    /// Store errors abort the run before any write happens.
    pub async fn aggregate(
        &self,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<(CreatorRow, CreatorStatistics)>> {
        let window_start = now - Duration::days(window_days);

        let roster = self
            .store
            .fetch_creator_roster()
            .await
            .map_err(|e| LeaderboardError::Aggregation(format!("creator roster: {}", e)))?;
        let recipes = self
            .store
            .fetch_recipes_since(window_start)
            .await
            .map_err(|e| LeaderboardError::Aggregation(format!("recipe rows: {}", e)))?;
        let follower_counts = self
            .store
            .fetch_follower_counts()
            .await
            .map_err(|e| LeaderboardError::Aggregation(format!("follower counts: {}", e)))?;

        debug!(
            creators = roster.len(),
            recipes = recipes.len(),
            window_days,
            "Aggregating creator statistics"
        );

        Ok(reduce_statistics(
            roster,
            &recipes,
            &follower_counts,
            window_start,
            now,
        ))
    }
}

/// Pure reduction from raw rows to per-creator statistics.
pub fn reduce_statistics(
    roster: Vec<CreatorRow>,
    recipes: &[RecipeRow],
    follower_counts: &HashMap<Uuid, i64>,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<(CreatorRow, CreatorStatistics)> {
    let mut by_creator: HashMap<Uuid, Vec<&RecipeRow>> = HashMap::new();
    for recipe in recipes {
        if recipe.created_at >= window_start && recipe.created_at <= now {
            by_creator.entry(recipe.creator_id).or_default().push(recipe);
        }
    }

    roster
        .into_iter()
        .map(|row| {
            let in_window = by_creator.get(&row.creator_id).map_or(&[][..], Vec::as_slice);
            let follower_count = follower_counts.get(&row.creator_id).copied().unwrap_or(0);
            let stats = creator_statistics(in_window, follower_count);
            (row, stats)
        })
        .collect()
}

fn creator_statistics(recipes: &[&RecipeRow], follower_count: i64) -> CreatorStatistics {
    let recipe_count = recipes.len() as i64;

    let ratings: Vec<f64> = recipes.iter().filter_map(|r| r.rating).collect();
    // Guard the empty-set division: no rated recipes means 0, never NaN.
    let avg_rating = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    };

    let active_days: HashSet<_> = recipes.iter().map(|r| r.created_at.date_naive()).collect();

    CreatorStatistics {
        recipe_count,
        avg_rating,
        follower_count,
        total_likes: recipes.iter().map(|r| r.likes_count).sum(),
        total_comments: recipes.iter().map(|r| r.comments_count).sum(),
        total_saves: recipes.iter().map(|r| r.saves_count).sum(),
        days_active: active_days.len() as i64,
    }
}
