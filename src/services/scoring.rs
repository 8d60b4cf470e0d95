//! Creator score formulas.
//!
//! Both scores are pure functions of their inputs: no store access, no
//! hidden state, deterministic for identical arguments.

use crate::models::CreatorStatistics;
use chrono::{DateTime, Utc};

const SECONDS_PER_MONTH: f64 = 30.0 * 24.0 * 3600.0;

/// Tunable weights applied to the engagement signals.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    pub recipe_count: f64,
    pub avg_rating: f64,
    pub followers: f64,
    pub likes: f64,
    pub comments: f64,
    pub saves: f64,
    pub activity_bonus: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            recipe_count: 1.0,
            avg_rating: 10.0,
            followers: 0.5,
            likes: 0.2,
            comments: 0.3,
            saves: 0.4,
            activity_bonus: 0.1,
        }
    }
}

/// Stateless scorer holding the weight table and decay factor.
#[derive(Debug, Clone)]
pub struct CreatorScorer {
    weights: ScoreWeights,
    /// Per-month multiplicative inactivity penalty, in (0, 1].
    decay_factor: f64,
}

impl Default for CreatorScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default(), 0.8)
    }
}

impl CreatorScorer {
    pub fn new(weights: ScoreWeights, decay_factor: f64) -> Self {
        Self {
            weights,
            decay_factor,
        }
    }

    /// Weighted engagement score with continuous inactivity decay.
    ///
    /// `score = (base + activity_bonus) * decay_factor^months_inactive`
    /// where `months_inactive` is fractional, not floored. Non-negative for
    /// non-negative inputs and monotonically non-increasing in inactivity.
    pub fn creator_score(
        &self,
        stats: &CreatorStatistics,
        last_active_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f64 {
        let w = &self.weights;
        let base = w.recipe_count * stats.recipe_count as f64
            + w.avg_rating * stats.avg_rating
            + w.followers * stats.follower_count as f64
            + w.likes * stats.total_likes as f64
            + w.comments * stats.total_comments as f64
            + w.saves * stats.total_saves as f64;
        let activity_bonus = w.activity_bonus * stats.days_active as f64;

        let inactive_secs = (now - last_active_at).num_seconds().max(0) as f64;
        let months_inactive = inactive_secs / SECONDS_PER_MONTH;

        (base + activity_bonus) * self.decay_factor.powf(months_inactive)
    }

    /// Growth-weighted rising score against the previous-period baseline.
    ///
    /// Returns 0 when there is no baseline: a creator cannot rise without
    /// history. Growth per metric is floored at 0 (declines never go
    /// negative) and the denominator is floored at 1.
    pub fn rising_score(
        &self,
        current: &CreatorStatistics,
        previous: Option<&CreatorStatistics>,
    ) -> f64 {
        let previous = match previous {
            Some(p) => p,
            None => return 0.0,
        };

        let w = &self.weights;
        w.followers * relative_growth(current.follower_count, previous.follower_count)
            + w.likes * relative_growth(current.total_likes, previous.total_likes)
            + w.recipe_count * relative_growth(current.recipe_count, previous.recipe_count)
    }
}

fn relative_growth(current: i64, previous: i64) -> f64 {
    ((current - previous) as f64 / previous.max(1) as f64).max(0.0)
}
