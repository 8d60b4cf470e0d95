//! End-to-end scoring cycle tests against the in-memory stores.

use chrono::{Duration as ChronoDuration, Utc};
use leaderboard_service::cache::{top_view_key, RISING_VIEW_KEY, TOP_VIEW_KEY};
use leaderboard_service::models::{RecipeRow, StatisticsSnapshot};
use leaderboard_service::store::{MemoryCreatorStore, MemorySnapshotStore, SnapshotStore};
use leaderboard_service::{
    CachedLeaderboard, CreatorScorer, CreatorStatistics, LeaderboardError, MemoryViewCache,
    ScoringJob, ScoringJobConfig, ViewCache,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn build_job(
    creator_store: Arc<MemoryCreatorStore>,
    snapshot_store: Arc<MemorySnapshotStore>,
) -> ScoringJob {
    ScoringJob::new(
        creator_store,
        snapshot_store,
        CreatorScorer::default(),
        None,
        ScoringJobConfig::default(),
    )
}

fn recipe(
    creator_id: Uuid,
    rating: Option<f64>,
    likes: i64,
    comments: i64,
    saves: i64,
    age_days: i64,
) -> RecipeRow {
    RecipeRow {
        creator_id,
        rating,
        likes_count: likes,
        comments_count: comments,
        saves_count: saves,
        created_at: Utc::now() - ChronoDuration::days(age_days),
    }
}

#[tokio::test]
async fn cycle_scores_creator_from_seeded_engagement() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "alice").await;
    creators.add_recipe(recipe(creator_id, Some(5.0), 3, 1, 1, 0)).await;
    creators.add_recipe(recipe(creator_id, Some(4.0), 2, 1, 0, 1)).await;
    creators.set_follower_count(creator_id, 3).await;

    let job = build_job(Arc::clone(&creators), Arc::clone(&snapshots));
    let summary = job.run_scoring_cycle().await.unwrap();
    assert_eq!(summary.creators_processed, 1);

    let record = creators.get_creator(creator_id).await.unwrap();
    assert_eq!(record.stats.recipe_count, 2);
    assert!((record.stats.avg_rating - 4.5).abs() < 1e-9);
    assert_eq!(record.stats.follower_count, 3);
    assert_eq!(record.stats.total_likes, 5);
    assert_eq!(record.stats.days_active, 2);

    // base = 1*2 + 10*4.5 + 0.5*3 + 0.2*5 + 0.3*2 + 0.4*1 = 50.5,
    // activity bonus 0.2, last active just now so decay is ~1.
    assert!(
        (record.creator_score - 50.7).abs() < 1e-3,
        "got {}",
        record.creator_score
    );
    // First run has no baseline to rise against.
    assert_eq!(record.rising_score, 0.0);

    let history = snapshots.all().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].creator_id, creator_id);
    assert_eq!(history[0].stats, record.stats);
}

#[tokio::test]
async fn second_run_computes_rising_score_from_first_snapshot() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "bob").await;
    creators.add_recipe(recipe(creator_id, Some(4.0), 1, 0, 0, 0)).await;
    creators.set_follower_count(creator_id, 4).await;

    let job = build_job(Arc::clone(&creators), Arc::clone(&snapshots));
    job.run_scoring_cycle().await.unwrap();
    assert_eq!(
        creators.get_creator(creator_id).await.unwrap().rising_score,
        0.0
    );

    // Followers grow from 4 to 6 between runs: growth (6-4)/4 = 0.5,
    // weighted by the follower weight 0.5.
    creators.set_follower_count(creator_id, 6).await;
    job.run_scoring_cycle().await.unwrap();

    let record = creators.get_creator(creator_id).await.unwrap();
    assert!(
        (record.rising_score - 0.25).abs() < 1e-9,
        "got {}",
        record.rising_score
    );
    assert_eq!(snapshots.all().await.len(), 2);
}

#[tokio::test]
async fn rising_baseline_is_earliest_snapshot_in_window() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "carol").await;
    creators.add_recipe(recipe(creator_id, None, 0, 0, 0, 0)).await;
    creators.set_follower_count(creator_id, 20).await;

    // Recipe count matches the current window so only follower growth
    // contributes to the rising score.
    let stats_with_followers = |followers: i64| CreatorStatistics {
        follower_count: followers,
        recipe_count: 1,
        ..Default::default()
    };
    // Outside the 30-day window: must be ignored.
    snapshots
        .append_snapshots(&[StatisticsSnapshot {
            creator_id,
            stats: stats_with_followers(1),
            created_at: Utc::now() - ChronoDuration::days(40),
        }])
        .await
        .unwrap();
    // In window; the earliest one is the baseline.
    snapshots
        .append_snapshots(&[
            StatisticsSnapshot {
                creator_id,
                stats: stats_with_followers(10),
                created_at: Utc::now() - ChronoDuration::days(20),
            },
            StatisticsSnapshot {
                creator_id,
                stats: stats_with_followers(100),
                created_at: Utc::now() - ChronoDuration::days(5),
            },
        ])
        .await
        .unwrap();

    let job = build_job(Arc::clone(&creators), Arc::clone(&snapshots));
    job.run_scoring_cycle().await.unwrap();

    // Against the 20-day-old baseline: (20 - 10) / 10 = 1.0 → 0.5 * 1.0.
    // The 5-day-old snapshot (followers 100) would have produced 0.
    let record = creators.get_creator(creator_id).await.unwrap();
    assert!(
        (record.rising_score - 0.5).abs() < 1e-9,
        "got {}",
        record.rising_score
    );
}

#[tokio::test]
async fn back_to_back_runs_yield_identical_creator_scores() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "dave").await;
    creators.add_recipe(recipe(creator_id, Some(3.5), 10, 4, 2, 3)).await;
    creators.set_follower_count(creator_id, 50).await;

    let job = build_job(Arc::clone(&creators), Arc::clone(&snapshots));
    job.run_scoring_cycle().await.unwrap();
    let first = creators.get_creator(creator_id).await.unwrap().creator_score;
    job.run_scoring_cycle().await.unwrap();
    let second = creators.get_creator(creator_id).await.unwrap().creator_score;

    // Underlying data unchanged; only wall-clock microseconds differ.
    assert!(
        (first - second).abs() < 1e-4,
        "first={} second={}",
        first,
        second
    );
}

#[tokio::test]
async fn inactive_creator_with_no_window_activity_still_scored() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    // Only recipe is 120 days old: outside the 90-day activity window,
    // but the creator stays on the roster with zeroed window stats.
    creators.add_creator(creator_id, "erin").await;
    creators.add_recipe(recipe(creator_id, Some(5.0), 9, 9, 9, 120)).await;
    creators.set_follower_count(creator_id, 10).await;

    let job = build_job(Arc::clone(&creators), Arc::clone(&snapshots));
    let summary = job.run_scoring_cycle().await.unwrap();
    assert_eq!(summary.creators_processed, 1);

    let record = creators.get_creator(creator_id).await.unwrap();
    assert_eq!(record.stats.recipe_count, 0);
    assert_eq!(record.stats.avg_rating, 0.0);
    assert!(record.creator_score.is_finite());
    // base = 0.5 * 10 = 5, decayed over 4 months: 5 * 0.8^4 = 2.048.
    assert!(
        (record.creator_score - 2.048).abs() < 1e-3,
        "got {}",
        record.creator_score
    );
}

#[tokio::test]
async fn retention_prunes_old_snapshots_even_with_zero_creators() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    snapshots
        .append_snapshots(&[
            StatisticsSnapshot {
                creator_id,
                stats: CreatorStatistics::default(),
                created_at: Utc::now() - ChronoDuration::days(100),
            },
            StatisticsSnapshot {
                creator_id,
                stats: CreatorStatistics::default(),
                created_at: Utc::now() - ChronoDuration::days(10),
            },
        ])
        .await
        .unwrap();

    let job = build_job(Arc::clone(&creators), Arc::clone(&snapshots));
    let summary = job.run_scoring_cycle().await.unwrap();

    assert_eq!(summary.creators_processed, 0);
    assert_eq!(summary.snapshots_pruned, 1);

    let remaining = snapshots.all().await;
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].created_at > Utc::now() - ChronoDuration::days(90));
}

#[tokio::test]
async fn persistence_failure_aborts_run_before_snapshots() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "frank").await;
    creators.add_recipe(recipe(creator_id, Some(4.0), 1, 1, 1, 0)).await;
    creators.set_fail_writes(true);

    let job = build_job(Arc::clone(&creators), Arc::clone(&snapshots));
    let err = job.run_scoring_cycle().await.unwrap_err();
    assert!(matches!(err, LeaderboardError::Persistence(_)), "{:?}", err);

    // The run died in the persisting stage: no snapshot was appended.
    assert!(snapshots.all().await.is_empty());
}

#[tokio::test]
async fn failed_run_leaves_cached_views_untouched() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "ivan").await;
    creators.add_recipe(recipe(creator_id, Some(4.0), 1, 1, 1, 0)).await;
    creators.set_fail_writes(true);

    let cache = Arc::new(MemoryViewCache::new());
    cache
        .put_view(TOP_VIEW_KEY, &CachedLeaderboard::new(Vec::new()))
        .await
        .unwrap();
    cache
        .put_view(RISING_VIEW_KEY, &CachedLeaderboard::new(Vec::new()))
        .await
        .unwrap();

    let cache_handle: Arc<dyn ViewCache> = cache.clone();
    let job = ScoringJob::new(
        creators.clone(),
        snapshots.clone(),
        CreatorScorer::default(),
        Some(cache_handle),
        ScoringJobConfig::default(),
    );

    let err = job.run_scoring_cycle().await.unwrap_err();
    assert!(matches!(err, LeaderboardError::Persistence(_)), "{:?}", err);

    // Stale-but-correct views survive a failed run; only a completed run
    // may invalidate them.
    assert!(cache.get_view(TOP_VIEW_KEY).await.unwrap().is_some());
    assert!(cache.get_view(RISING_VIEW_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn successful_run_invalidates_every_cached_view() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "judy").await;
    creators.add_recipe(recipe(creator_id, Some(4.0), 1, 1, 1, 0)).await;

    let cache = Arc::new(MemoryViewCache::new());
    for key in [
        TOP_VIEW_KEY.to_string(),
        RISING_VIEW_KEY.to_string(),
        top_view_key(Some(7)),
    ] {
        cache
            .put_view(&key, &CachedLeaderboard::new(Vec::new()))
            .await
            .unwrap();
    }

    let cache_handle: Arc<dyn ViewCache> = cache.clone();
    let job = ScoringJob::new(
        creators.clone(),
        snapshots.clone(),
        CreatorScorer::default(),
        Some(cache_handle),
        ScoringJobConfig::default(),
    );

    job.run_scoring_cycle().await.unwrap();

    assert!(cache.get_view(TOP_VIEW_KEY).await.unwrap().is_none());
    assert!(cache.get_view(RISING_VIEW_KEY).await.unwrap().is_none());
    assert!(cache
        .get_view(&top_view_key(Some(7)))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn concurrent_trigger_is_rejected_while_run_in_flight() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "grace").await;
    creators.add_recipe(recipe(creator_id, None, 0, 0, 0, 0)).await;
    creators.set_read_delay(Duration::from_millis(200));

    let job = Arc::new(build_job(Arc::clone(&creators), Arc::clone(&snapshots)));

    let background = {
        let job = Arc::clone(&job);
        tokio::spawn(async move { job.run_scoring_cycle().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = job.run_scoring_cycle().await.unwrap_err();
    assert!(matches!(err, LeaderboardError::JobAlreadyRunning), "{:?}", err);

    let summary = background.await.unwrap().unwrap();
    assert_eq!(summary.creators_processed, 1);
}

#[tokio::test]
async fn run_times_out_when_stores_stall() {
    let creators = Arc::new(MemoryCreatorStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let creator_id = Uuid::new_v4();

    creators.add_creator(creator_id, "heidi").await;
    creators.add_recipe(recipe(creator_id, None, 0, 0, 0, 0)).await;
    creators.set_read_delay(Duration::from_secs(5));

    let config = ScoringJobConfig {
        timeout_secs: 1,
        ..Default::default()
    };
    let job = ScoringJob::new(
        creators,
        snapshots,
        CreatorScorer::default(),
        None,
        config,
    );

    let err = job.run_scoring_cycle().await.unwrap_err();
    assert!(
        matches!(err, LeaderboardError::JobTimeout { seconds: 1 }),
        "{:?}",
        err
    );
}
