pub mod curation;
pub mod genre_resolver;
pub mod matcher;
pub mod rating;
pub mod rebuilder;
pub mod runner;
pub mod scheduler;
pub mod scoring;

pub use curation::CurationJob;
pub use runner::BatchJob;
pub use scoring::ScoringJob;

/// Tuning shared by both jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    /// Compilations or users processed at once
    pub max_concurrency: usize,
    /// Compute outcomes without writing them
    pub dry_run: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            dry_run: false,
        }
    }
}
