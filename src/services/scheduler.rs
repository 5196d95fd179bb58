use std::sync::Arc;

use chrono::{DateTime, Utc};
use croner::Cron;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    error::{AppError, AppResult},
    models::JobStatus,
    services::runner::BatchJob,
};

/// Parses a cron expression; a leading seconds field is optional
pub fn parse_schedule(expression: &str) -> AppResult<Cron> {
    Cron::new(expression)
        .with_seconds_optional()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid cron expression '{}': {}", expression, e)))
}

/// Next occurrence strictly after `after`
pub fn next_run(cron: &Cron, after: &DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    cron.find_next_occurrence(after, false)
        .map_err(|e| AppError::Internal(format!("No next occurrence for cron: {}", e)))
}

/// Spawns a loop that triggers `job` on every occurrence of `cron`
///
/// A failed run is logged and the loop waits for the next occurrence; retries
/// are left to the schedule itself.
pub fn spawn_schedule(job: Arc<dyn BatchJob>, cron: Cron) -> JoinHandle<()> {
    tokio::spawn(async move {
        let kind = job.kind();
        loop {
            let now = Utc::now();
            let next = match next_run(&cron, &now) {
                Ok(next) => next,
                Err(e) => {
                    error!(job = %kind, error = %e, "Stopping schedule");
                    return;
                }
            };

            info!(job = %kind, next_run = %next, "Waiting for next scheduled run");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match job.execute().await {
                Ok(JobStatus::Completed { succeeded, failed }) => {
                    info!(job = %kind, succeeded, failed, "Scheduled run completed");
                }
                Ok(JobStatus::Skipped) => {
                    warn!(job = %kind, "Scheduled run skipped, previous run still active");
                }
                Err(e) => {
                    error!(
                        job = %kind,
                        error = %e,
                        transient = e.is_transient(),
                        "Scheduled run failed"
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_daily_at_three() {
        let cron = parse_schedule("0 0 3 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

        let next = next_run(&cron, &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 17, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_five_field_expression_accepted() {
        let cron = parse_schedule("30 3 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 10, 16, 1, 0, 0).unwrap();

        let next = next_run(&cron, &after).unwrap();
        assert_eq!((next.hour(), next.minute()), (3, 30));
    }

    #[test]
    fn test_invalid_expression_is_config_error() {
        assert!(matches!(
            parse_schedule("every night"),
            Err(AppError::Config(_))
        ));
    }
}
