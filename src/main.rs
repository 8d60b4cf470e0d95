use anyhow::Context;
use leaderboard_service::store::{PgCreatorStore, PgSnapshotStore};
use leaderboard_service::cache::ViewCache;
use leaderboard_service::{
    Config, CreatorScorer, LeaderboardCache, ScoringJob, ScoringJobConfig,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    info!(
        run_once = config.job.run_once,
        activity_window_days = config.scoring.activity_window_days,
        rising_window_days = config.scoring.rising_window_days,
        "Starting leaderboard-service scoring runner"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;

    // Cache is advisory: a missing or unreachable Redis degrades query
    // latency, never correctness, so startup proceeds without it.
    let cache: Option<Arc<dyn ViewCache>> = match &config.redis.url {
        Some(url) => match LeaderboardCache::new(url, config.cache.ttl_secs).await {
            Ok(cache) => match cache.ping().await {
                Ok(()) => {
                    info!("Connected to Redis leaderboard cache");
                    Some(Arc::new(cache))
                }
                Err(e) => {
                    warn!(error = %e, "Redis unreachable, running without leaderboard cache");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to initialize Redis, running without leaderboard cache");
                None
            }
        },
        None => {
            info!("REDIS_URL not set, running without leaderboard cache");
            None
        }
    };

    let creator_store = Arc::new(PgCreatorStore::new(pool.clone()));
    let snapshot_store = Arc::new(PgSnapshotStore::new(pool));
    let scorer = CreatorScorer::new(config.scoring.weights.clone(), config.scoring.decay_factor);
    let job = ScoringJob::new(
        creator_store,
        snapshot_store,
        scorer,
        cache,
        ScoringJobConfig::from(&config),
    );

    if config.job.run_once {
        let summary = job
            .run_scoring_cycle()
            .await
            .context("Scoring cycle failed")?;
        info!(
            creators_processed = summary.creators_processed,
            snapshots_pruned = summary.snapshots_pruned,
            duration_ms = summary.duration_ms,
            "Scoring run complete, exiting"
        );
        return Ok(());
    }

    loop {
        match job.run_scoring_cycle().await {
            Ok(summary) => info!(
                creators_processed = summary.creators_processed,
                snapshots_pruned = summary.snapshots_pruned,
                duration_ms = summary.duration_ms,
                "Scoring run complete"
            ),
            // Failed runs wait for the next tick; there is no inner retry.
            Err(e) => error!(error = %e, "Scoring run failed, retrying on next tick"),
        }
        sleep(Duration::from_secs(config.job.interval_secs)).await;
    }
}
