use thiserror::Error;

pub type Result<T> = std::result::Result<T, LeaderboardError>;

#[derive(Debug, Error)]
pub enum LeaderboardError {
    /// Store read failed while collecting raw engagement data. Aborts the
    /// scoring run before any write happens.
    #[error("Aggregation failure: {0}")]
    Aggregation(String),

    /// Bulk write of scores or snapshots failed. The run is marked failed;
    /// scores are recomputed idempotently on the next run.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Cache transport failure. Never surfaced to query callers; every call
    /// site degrades to the direct store path.
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Scoring run already in progress")]
    JobAlreadyRunning,

    #[error("Scoring run timed out after {seconds}s")]
    JobTimeout { seconds: u64 },
}

impl From<sqlx::Error> for LeaderboardError {
    fn from(err: sqlx::Error) -> Self {
        LeaderboardError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for LeaderboardError {
    fn from(err: redis::RedisError) -> Self {
        LeaderboardError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for LeaderboardError {
    fn from(err: serde_json::Error) -> Self {
        LeaderboardError::Serialization(err.to_string())
    }
}
