pub mod scoring_job;

pub use scoring_job::{RunSummary, ScoringJob, ScoringJobConfig};
