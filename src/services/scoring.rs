use std::sync::Arc;

use tracing::{error, info, info_span, Instrument};

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{JobKind, JobRun, JobStatus, ScoringSummary},
    services::{
        rating::{self, RatingWeights},
        runner::{self, BatchJob},
        JobOptions,
    },
    telemetry::RunId,
};

/// Recomputes every user's rating from engagement signals
#[derive(Clone)]
pub struct ScoringJob {
    store: Arc<dyn CatalogStore>,
    weights: RatingWeights,
    options: JobOptions,
}

impl ScoringJob {
    pub fn new(store: Arc<dyn CatalogStore>, weights: RatingWeights, options: JobOptions) -> Self {
        Self {
            store,
            weights,
            options,
        }
    }

    pub async fn run(&self) -> AppResult<JobRun<ScoringSummary>> {
        let run_id = RunId::new();
        let span = info_span!("scoring_job", %run_id, dry_run = self.options.dry_run);

        runner::run_exclusive(self.store.as_ref(), JobKind::Scoring, self.sweep())
            .instrument(span)
            .await
    }

    async fn sweep(&self) -> AppResult<ScoringSummary> {
        info!(
            post_like = self.weights.post_like,
            compilation_favorite = self.weights.compilation_favorite,
            "Starting user rating calculation"
        );

        let user_ids = self.store.user_ids().await.map_err(|e| {
            error!(error = %e, "Failed to fetch users");
            e
        })?;
        info!(count = user_ids.len(), "Fetched users to score");

        let (results, lost_tasks) =
            runner::for_each_bounded(user_ids, self.options.max_concurrency, |user_id| {
                let store = self.store.clone();
                let weights = self.weights;
                let dry_run = self.options.dry_run;
                async move {
                    let result =
                        rating::recompute_user_rating(store.as_ref(), user_id, weights, dry_run)
                            .await;
                    (user_id, result)
                }
            })
            .await?;

        let mut summary = ScoringSummary {
            lost_tasks,
            ..Default::default()
        };
        for (user_id, result) in results {
            match result {
                Ok(_) => summary.updated += 1,
                Err(e) => {
                    error!(user_id, error = %e, "Failed to update user rating");
                    summary.failed_users.push(user_id);
                }
            }
        }
        summary.failed_users.sort_unstable();

        info!(
            updated = summary.updated,
            failed = summary.failed(),
            "Rating calculation finished"
        );

        Ok(summary)
    }
}

#[async_trait::async_trait]
impl BatchJob for ScoringJob {
    fn kind(&self) -> JobKind {
        JobKind::Scoring
    }

    async fn execute(&self) -> AppResult<JobStatus> {
        Ok(match self.run().await? {
            JobRun::Completed(summary) => summary.status(),
            JobRun::Skipped => JobStatus::Skipped,
        })
    }
}
