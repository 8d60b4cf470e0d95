//! Prometheus metrics for the scoring job and the cached read path.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::time::Duration;

static SCORING_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "leaderboard_scoring_runs_total",
        "Total scoring cycles by outcome (success/error/timeout/rejected)",
        &["status"]
    )
    .expect("Failed to register scoring runs metric")
});

static STAGE_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "leaderboard_scoring_stage_duration_seconds",
        "Duration of scoring job stages",
        &["stage"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register stage duration metric")
});

static CREATORS_SCORED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "leaderboard_creators_scored",
        "Number of creators scored in the last completed run"
    )
    .expect("Failed to register creators scored metric")
});

static SNAPSHOTS_PRUNED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "leaderboard_snapshots_pruned_total",
        "Total statistics snapshots removed by retention pruning"
    )
    .expect("Failed to register snapshots pruned metric")
});

static CACHE_FALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "leaderboard_cache_fallbacks_total",
        "Leaderboard queries answered from the store after a cache miss or failure",
        &["view"]
    )
    .expect("Failed to register cache fallbacks metric")
});

/// Record the outcome of one scoring cycle.
pub fn record_run(status: &str) {
    SCORING_RUNS_TOTAL.with_label_values(&[status]).inc();
}

/// Record how long one job stage took.
pub fn record_stage_duration(stage: &str, duration: Duration) {
    STAGE_DURATION_SECONDS
        .with_label_values(&[stage])
        .observe(duration.as_secs_f64());
}

pub fn set_creators_scored(count: usize) {
    CREATORS_SCORED.set(count as i64);
}

pub fn add_snapshots_pruned(count: u64) {
    SNAPSHOTS_PRUNED_TOTAL.inc_by(count);
}

/// Record a query served from the store instead of the cache.
pub fn record_cache_fallback(view: &str) {
    CACHE_FALLBACKS_TOTAL.with_label_values(&[view]).inc();
}
