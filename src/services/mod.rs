pub mod aggregator;
pub mod leaderboard;
pub mod scoring;

pub use aggregator::StatsAggregator;
pub use leaderboard::LeaderboardService;
pub use scoring::{CreatorScorer, ScoreWeights};
