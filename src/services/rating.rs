use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::UserId,
};

/// Points awarded per engagement signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingWeights {
    pub post_like: i64,
    pub compilation_favorite: i64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            post_like: 1,
            compilation_favorite: 5,
        }
    }
}

impl RatingWeights {
    /// Weighted sum of the signals, `None` if it overflows
    pub fn score(&self, signals: &EngagementSignals) -> Option<i64> {
        let likes = self.post_like.checked_mul(signals.total_post_likes)?;
        let favorites = self
            .compilation_favorite
            .checked_mul(signals.total_compilation_favorites)?;
        likes.checked_add(favorites)
    }
}

/// Raw counts a user's rating is derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngagementSignals {
    /// Likes summed over the user's posts
    pub total_post_likes: i64,
    /// Favorites placed by other users on the user's compilations
    pub total_compilation_favorites: i64,
}

pub async fn collect_signals(
    store: &dyn CatalogStore,
    user_id: UserId,
) -> AppResult<EngagementSignals> {
    Ok(EngagementSignals {
        total_post_likes: store.total_post_likes(user_id).await?,
        total_compilation_favorites: store.external_favorite_count(user_id).await?,
    })
}

/// Recomputes a user's rating and overwrites the stored value
///
/// With `dry_run` the rating is computed but not written.
#[instrument(skip(store, weights))]
pub async fn recompute_user_rating(
    store: &dyn CatalogStore,
    user_id: UserId,
    weights: RatingWeights,
    dry_run: bool,
) -> AppResult<i64> {
    let signals = collect_signals(store, user_id).await?;
    let rating = weights.score(&signals).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "Rating for user {} overflows ({} post likes, {} compilation favorites)",
            user_id, signals.total_post_likes, signals.total_compilation_favorites
        ))
    })?;

    if dry_run {
        info!(
            post_likes = signals.total_post_likes,
            compilation_favorites = signals.total_compilation_favorites,
            rating,
            "Computed rating (dry run, not written)"
        );
        return Ok(rating);
    }

    debug!(
        post_likes = signals.total_post_likes,
        compilation_favorites = signals.total_compilation_favorites,
        rating,
        "Computed rating"
    );
    store.update_user_rating(user_id, rating).await?;

    Ok(rating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockCatalogStore;
    use mockall::predicate::eq;

    #[test]
    fn test_score_formula() {
        let signals = EngagementSignals {
            total_post_likes: 7,
            total_compilation_favorites: 2,
        };
        assert_eq!(RatingWeights::default().score(&signals), Some(17));

        let custom = RatingWeights {
            post_like: 2,
            compilation_favorite: 10,
        };
        assert_eq!(custom.score(&signals), Some(34));
    }

    #[test]
    fn test_no_signals_scores_zero() {
        assert_eq!(
            RatingWeights::default().score(&EngagementSignals::default()),
            Some(0)
        );
    }

    #[test]
    fn test_score_overflow_is_none() {
        let signals = EngagementSignals {
            total_post_likes: 2,
            total_compilation_favorites: 0,
        };
        let huge = RatingWeights {
            post_like: i64::MAX,
            compilation_favorite: 5,
        };
        assert_eq!(huge.score(&signals), None);

        let sum_overflows = RatingWeights {
            post_like: i64::MAX,
            compilation_favorite: 1,
        };
        let both = EngagementSignals {
            total_post_likes: 1,
            total_compilation_favorites: 1,
        };
        assert_eq!(sum_overflows.score(&both), None);
    }

    #[tokio::test]
    async fn test_overflowing_rating_is_rejected_without_write() {
        let mut store = MockCatalogStore::new();
        store.expect_total_post_likes().returning(|_| Ok(2));
        store.expect_external_favorite_count().returning(|_| Ok(0));
        store.expect_update_user_rating().never();

        let weights = RatingWeights {
            post_like: i64::MAX,
            compilation_favorite: 5,
        };
        let result = recompute_user_rating(&store, 7, weights, false).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_recompute_writes_rating() {
        let mut store = MockCatalogStore::new();
        store
            .expect_total_post_likes()
            .with(eq(42))
            .returning(|_| Ok(7));
        store
            .expect_external_favorite_count()
            .with(eq(42))
            .returning(|_| Ok(2));
        store
            .expect_update_user_rating()
            .with(eq(42), eq(17))
            .times(1)
            .returning(|_, _| Ok(()));

        let rating = recompute_user_rating(&store, 42, RatingWeights::default(), false)
            .await
            .unwrap();
        assert_eq!(rating, 17);
    }

    #[tokio::test]
    async fn test_dry_run_skips_write() {
        let mut store = MockCatalogStore::new();
        store.expect_total_post_likes().returning(|_| Ok(3));
        store.expect_external_favorite_count().returning(|_| Ok(0));
        store.expect_update_user_rating().never();

        let rating = recompute_user_rating(&store, 1, RatingWeights::default(), true)
            .await
            .unwrap();
        assert_eq!(rating, 3);
    }
}
