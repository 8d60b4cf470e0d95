//! Periodic scoring cycle.
//!
//! One run walks the stages Aggregating → Scoring → Persisting →
//! SnapshottingAndPruning → CacheInvalidating. Any stage failure abandons
//! the run: nothing is rolled back, the cache is NOT invalidated (stale
//! cache beats an inconsistent recompute), and the error goes back to the
//! scheduler, which retries on its next tick.

use crate::cache::ViewCache;
use crate::config::Config;
use crate::error::{LeaderboardError, Result};
use crate::metrics;
use crate::models::{CreatorRecord, StatisticsSnapshot};
use crate::services::{CreatorScorer, StatsAggregator};
use crate::store::{CreatorStore, SnapshotStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Aggregating,
    Scoring,
    Persisting,
    SnapshottingAndPruning,
    CacheInvalidating,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregating => "aggregating",
            Self::Scoring => "scoring",
            Self::Persisting => "persisting",
            Self::SnapshottingAndPruning => "snapshotting_and_pruning",
            Self::CacheInvalidating => "cache_invalidating",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one completed scoring cycle.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub creators_processed: usize,
    pub snapshots_pruned: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ScoringJobConfig {
    pub activity_window_days: i64,
    pub rising_window_days: i64,
    pub retention_days: i64,
    /// Concurrent per-creator score computations within one run.
    pub concurrency: usize,
    /// Wall-clock bound per run; expiry fails the run.
    pub timeout_secs: u64,
}

impl Default for ScoringJobConfig {
    fn default() -> Self {
        Self {
            activity_window_days: 90,
            rising_window_days: 30,
            retention_days: 90,
            concurrency: 16,
            timeout_secs: 300,
        }
    }
}

impl From<&Config> for ScoringJobConfig {
    fn from(config: &Config) -> Self {
        Self {
            activity_window_days: config.scoring.activity_window_days,
            rising_window_days: config.scoring.rising_window_days,
            retention_days: config.scoring.retention_days,
            concurrency: config.scoring.concurrency,
            timeout_secs: config.job.timeout_secs,
        }
    }
}

/// Scoring cycle orchestrator. Holds the only write path to creator scores
/// and snapshots; at most one run executes at a time per process.
pub struct ScoringJob {
    aggregator: StatsAggregator,
    creator_store: Arc<dyn CreatorStore>,
    snapshot_store: Arc<dyn SnapshotStore>,
    scorer: CreatorScorer,
    cache: Option<Arc<dyn ViewCache>>,
    config: ScoringJobConfig,
    run_lock: Mutex<()>,
}

impl ScoringJob {
    pub fn new(
        creator_store: Arc<dyn CreatorStore>,
        snapshot_store: Arc<dyn SnapshotStore>,
        scorer: CreatorScorer,
        cache: Option<Arc<dyn ViewCache>>,
        config: ScoringJobConfig,
    ) -> Self {
        Self {
            aggregator: StatsAggregator::new(Arc::clone(&creator_store)),
            creator_store,
            snapshot_store,
            scorer,
            cache,
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Run one scoring cycle. Fails fast with `JobAlreadyRunning` when a
    /// run is already in flight; there is no queueing and no retry inside
    /// a run.
    pub async fn run_scoring_cycle(&self) -> Result<RunSummary> {
        let _guard = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                metrics::record_run("rejected");
                return Err(LeaderboardError::JobAlreadyRunning);
            }
        };

        let started_at = Utc::now();
        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        match tokio::time::timeout(timeout, self.execute_cycle(started_at)).await {
            Ok(Ok((creators_processed, snapshots_pruned))) => {
                let summary = RunSummary {
                    creators_processed,
                    snapshots_pruned,
                    started_at,
                    completed_at: Utc::now(),
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                metrics::record_run("success");
                metrics::set_creators_scored(creators_processed);
                info!(
                    creators_processed,
                    snapshots_pruned,
                    duration_ms = summary.duration_ms,
                    "Scoring cycle completed"
                );
                Ok(summary)
            }
            Ok(Err(e)) => {
                metrics::record_run("error");
                error!(error = %e, duration_ms = started.elapsed().as_millis() as u64, "Scoring cycle failed");
                Err(e)
            }
            Err(_) => {
                metrics::record_run("timeout");
                error!(timeout_secs = self.config.timeout_secs, "Scoring cycle timed out");
                Err(LeaderboardError::JobTimeout {
                    seconds: self.config.timeout_secs,
                })
            }
        }
    }

    async fn execute_cycle(&self, now: DateTime<Utc>) -> Result<(usize, u64)> {
        // Aggregating
        let stage_started = Instant::now();
        let stats = self
            .aggregator
            .aggregate(self.config.activity_window_days, now)
            .await?;
        metrics::record_stage_duration(JobStage::Aggregating.as_str(), stage_started.elapsed());
        info!(stage = %JobStage::Aggregating, creators = stats.len(), "Stage completed");

        // Scoring: pure per creator, so computed concurrently. Each creator
        // pairs its fresh statistics with the earliest snapshot inside the
        // rising window as the growth baseline.
        let stage_started = Instant::now();
        let since = now - ChronoDuration::days(self.config.rising_window_days);
        let records: Vec<CreatorRecord> = stream::iter(stats.into_iter().map(|(row, stats)| {
            let snapshot_store = Arc::clone(&self.snapshot_store);
            let scorer = self.scorer.clone();
            async move {
                let previous = snapshot_store
                    .find_previous(row.creator_id, since, now)
                    .await
                    .map_err(|e| {
                        LeaderboardError::Aggregation(format!(
                            "previous snapshot lookup for {}: {}",
                            row.creator_id, e
                        ))
                    })?;

                let creator_score = scorer.creator_score(&stats, row.last_active_at, now);
                let rising_score =
                    scorer.rising_score(&stats, previous.as_ref().map(|p| &p.stats));

                Ok::<CreatorRecord, LeaderboardError>(CreatorRecord {
                    creator_id: row.creator_id,
                    username: row.username,
                    display_name: row.display_name,
                    creator_score,
                    rising_score,
                    stats,
                    updated_at: now,
                })
            }
        }))
        .buffer_unordered(self.config.concurrency.max(1))
        .try_collect()
        .await?;
        metrics::record_stage_duration(JobStage::Scoring.as_str(), stage_started.elapsed());
        info!(stage = %JobStage::Scoring, creators = records.len(), "Stage completed");

        // Persisting
        let stage_started = Instant::now();
        if !records.is_empty() {
            self.creator_store
                .upsert_scores(&records)
                .await
                .map_err(|e| LeaderboardError::Persistence(format!("score upsert: {}", e)))?;
        }
        metrics::record_stage_duration(JobStage::Persisting.as_str(), stage_started.elapsed());
        info!(stage = %JobStage::Persisting, "Stage completed");

        // Snapshotting and pruning. Pruning is unconditional: it runs even
        // when this cycle found zero creators.
        let stage_started = Instant::now();
        if !records.is_empty() {
            let snapshots: Vec<StatisticsSnapshot> = records
                .iter()
                .map(|record| StatisticsSnapshot {
                    creator_id: record.creator_id,
                    stats: record.stats.clone(),
                    created_at: now,
                })
                .collect();
            self.snapshot_store
                .append_snapshots(&snapshots)
                .await
                .map_err(|e| LeaderboardError::Persistence(format!("snapshot append: {}", e)))?;
        }
        let cutoff = now - ChronoDuration::days(self.config.retention_days);
        let snapshots_pruned = self
            .snapshot_store
            .prune_older_than(cutoff)
            .await
            .map_err(|e| LeaderboardError::Persistence(format!("snapshot pruning: {}", e)))?;
        metrics::add_snapshots_pruned(snapshots_pruned);
        metrics::record_stage_duration(
            JobStage::SnapshottingAndPruning.as_str(),
            stage_started.elapsed(),
        );
        info!(stage = %JobStage::SnapshottingAndPruning, snapshots_pruned, "Stage completed");

        // Cache invalidating: reached only after every write stage
        // succeeded. A cache outage here is logged and swallowed; the view
        // keys expire by TTL and the data upstream is already consistent.
        let stage_started = Instant::now();
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate_all().await {
                warn!(error = %e, "Cache invalidation failed, stale views will expire by TTL");
            }
        }
        metrics::record_stage_duration(
            JobStage::CacheInvalidating.as_str(),
            stage_started.elapsed(),
        );

        Ok((records.len(), snapshots_pruned))
    }
}
