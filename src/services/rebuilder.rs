use std::collections::BTreeSet;

use tracing::warn;

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{CompilationId, LinkFailure, MovieId},
};

/// Result of replacing a compilation's movie links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildOutcome {
    /// Links removed before inserting
    pub removed: u64,
    pub inserted: Vec<MovieId>,
    pub failed: Vec<LinkFailure>,
}

impl RebuildOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Makes the compilation's links exactly equal to `target`
///
/// All existing links are deleted and the target set is inserted link by
/// link. A failed delete aborts the rebuild; a failed insert is recorded and
/// the remaining links are still inserted.
pub async fn rebuild_compilation(
    store: &dyn CatalogStore,
    compilation_id: CompilationId,
    target: &BTreeSet<MovieId>,
) -> AppResult<RebuildOutcome> {
    let removed = store.delete_compilation_links(compilation_id).await?;

    let mut outcome = RebuildOutcome {
        removed,
        ..Default::default()
    };

    for &movie_id in target {
        match store.insert_compilation_link(compilation_id, movie_id).await {
            Ok(()) => outcome.inserted.push(movie_id),
            Err(e) => {
                warn!(compilation_id, movie_id, error = %e, "Failed to link movie");
                outcome.failed.push(LinkFailure {
                    movie_id,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockCatalogStore;
    use crate::error::AppError;
    use mockall::{predicate::eq, Sequence};

    #[tokio::test]
    async fn test_deletes_before_inserting() {
        let mut store = MockCatalogStore::new();
        let mut seq = Sequence::new();
        store
            .expect_delete_compilation_links()
            .with(eq(7))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(4));
        store
            .expect_insert_compilation_link()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let outcome = rebuild_compilation(&store, 7, &BTreeSet::from([1, 2]))
            .await
            .unwrap();

        assert_eq!(outcome.removed, 4);
        assert_eq!(outcome.inserted, vec![1, 2]);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_insert_failure_does_not_stop_remaining_links() {
        let mut store = MockCatalogStore::new();
        store
            .expect_delete_compilation_links()
            .returning(|_| Ok(0));
        store
            .expect_insert_compilation_link()
            .times(3)
            .returning(|_, movie_id| {
                if movie_id == 2 {
                    Err(AppError::NotFound(format!("Movie {}", movie_id)))
                } else {
                    Ok(())
                }
            });

        let outcome = rebuild_compilation(&store, 7, &BTreeSet::from([1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(outcome.inserted, vec![1, 3]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].movie_id, 2);
    }

    #[tokio::test]
    async fn test_delete_failure_aborts_rebuild() {
        let mut store = MockCatalogStore::new();
        store
            .expect_delete_compilation_links()
            .returning(|_| Err(AppError::Internal("connection reset".to_string())));
        store.expect_insert_compilation_link().never();

        let result = rebuild_compilation(&store, 7, &BTreeSet::from([1])).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_target_clears_links() {
        let mut store = MockCatalogStore::new();
        store
            .expect_delete_compilation_links()
            .returning(|_| Ok(5));
        store.expect_insert_compilation_link().never();

        let outcome = rebuild_compilation(&store, 7, &BTreeSet::new()).await.unwrap();
        assert_eq!(outcome.removed, 5);
        assert!(outcome.inserted.is_empty());
    }
}
