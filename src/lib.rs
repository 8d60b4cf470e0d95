pub mod cache;
pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;

pub use cache::{LeaderboardCache, MemoryViewCache, ViewCache};
pub use config::Config;
pub use error::{LeaderboardError, Result};
pub use jobs::{RunSummary, ScoringJob, ScoringJobConfig};
pub use models::{CachedLeaderboard, CreatorRecord, CreatorStatistics, StatisticsSnapshot};
pub use services::{CreatorScorer, LeaderboardService, ScoreWeights, StatsAggregator};
