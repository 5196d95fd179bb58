use std::future::Future;
use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{error, warn, Instrument};

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::{JobKind, JobRun, JobStatus},
};

/// A batch job that can be triggered from the CLI or the scheduler
#[async_trait::async_trait]
pub trait BatchJob: Send + Sync {
    fn kind(&self) -> JobKind;

    /// Runs the job once, returning per-item counts
    ///
    /// `Err` means the run failed as a whole; per-item failures are counted in
    /// the status instead.
    async fn execute(&self) -> AppResult<JobStatus>;
}

/// Runs `body` while holding the job's run lock
///
/// Returns `JobRun::Skipped` without running `body` when another run holds
/// the lock. The lock is released whether `body` succeeds or not.
pub async fn run_exclusive<T, F>(
    store: &dyn CatalogStore,
    kind: JobKind,
    body: F,
) -> AppResult<JobRun<T>>
where
    F: Future<Output = AppResult<T>>,
{
    if !store.try_acquire_run_lock(kind).await? {
        warn!(job = %kind, "Another run holds the lock, skipping");
        return Ok(JobRun::Skipped);
    }

    let result = body.await;

    if let Err(e) = store.release_run_lock(kind).await {
        warn!(job = %kind, error = %e, "Failed to release run lock");
    }

    result.map(JobRun::Completed)
}

/// Runs `work` for every item on at most `limit` concurrent tasks
///
/// Returns the outputs in completion order and the number of tasks that
/// panicked. Each task runs inside the caller's span.
pub async fn for_each_bounded<I, T, F, Fut>(
    items: Vec<I>,
    limit: usize,
    work: F,
) -> AppResult<(Vec<T>, usize)>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();
    let expected = items.len();

    for item in items {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let task = work(item);
        tasks.spawn(
            async move {
                let _permit = permit;
                task.await
            }
            .in_current_span(),
        );
    }

    let mut outputs = Vec::with_capacity(expected);
    let mut lost = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(output) => outputs.push(output),
            Err(e) => {
                error!(error = %e, "Worker task failed");
                lost += 1;
            }
        }
    }

    Ok((outputs, lost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCatalogStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_skips_when_lock_held() {
        let store = MemoryCatalogStore::new();
        store.try_acquire_run_lock(JobKind::Scoring).await.unwrap();

        let ran = AtomicUsize::new(0);
        let run = run_exclusive(&store, JobKind::Scoring, async {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(run, JobRun::Skipped);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lock_released_after_failed_body() {
        let store = MemoryCatalogStore::new();

        let result: AppResult<JobRun<()>> = run_exclusive(&store, JobKind::Curation, async {
            Err(AppError::Internal("fatal".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert!(store.try_acquire_run_lock(JobKind::Curation).await.unwrap());
    }

    #[tokio::test]
    async fn test_bounded_pool_respects_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (outputs, lost) = for_each_bounded((0..20).collect(), 3, |i: usize| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                active.fetch_sub(1, Ordering::SeqCst);
                i * 2
            }
        })
        .await
        .unwrap();

        assert_eq!(lost, 0);
        assert_eq!(outputs.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_panicking_task_is_counted() {
        let (outputs, lost) = for_each_bounded(vec![1, 2, 3], 2, |i: i32| async move {
            if i == 2 {
                panic!("worker blew up");
            }
            i
        })
        .await
        .unwrap();

        assert_eq!(lost, 1);
        assert_eq!(outputs.len(), 2);
    }
}
