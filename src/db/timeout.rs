use std::future::Future;
use std::time::Duration;

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::{Compilation, CompilationId, Genre, GenreId, JobKind, MovieGenreLink, MovieId, UserId},
};

/// Store wrapper that bounds every call with a deadline
///
/// A hung connection then surfaces as `AppError::Timeout` at the scope of the
/// call instead of stalling the whole job.
pub struct TimeoutStore<S> {
    inner: S,
    limit: Duration,
}

impl<S: CatalogStore> TimeoutStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "{} exceeded {:?}",
                operation, self.limit
            ))),
        }
    }
}

#[async_trait::async_trait]
impl<S: CatalogStore> CatalogStore for TimeoutStore<S> {
    async fn system_compilations(&self) -> AppResult<Vec<Compilation>> {
        self.bounded("system_compilations", self.inner.system_compilations())
            .await
    }

    async fn genres_by_names(&self, names: &[String]) -> AppResult<Vec<Genre>> {
        self.bounded("genres_by_names", self.inner.genres_by_names(names))
            .await
    }

    async fn movie_genre_links(&self, genre_ids: &[GenreId]) -> AppResult<Vec<MovieGenreLink>> {
        self.bounded("movie_genre_links", self.inner.movie_genre_links(genre_ids))
            .await
    }

    async fn delete_compilation_links(&self, compilation_id: CompilationId) -> AppResult<u64> {
        self.bounded(
            "delete_compilation_links",
            self.inner.delete_compilation_links(compilation_id),
        )
        .await
    }

    async fn insert_compilation_link(
        &self,
        compilation_id: CompilationId,
        movie_id: MovieId,
    ) -> AppResult<()> {
        self.bounded(
            "insert_compilation_link",
            self.inner.insert_compilation_link(compilation_id, movie_id),
        )
        .await
    }

    async fn user_ids(&self) -> AppResult<Vec<UserId>> {
        self.bounded("user_ids", self.inner.user_ids()).await
    }

    async fn total_post_likes(&self, user_id: UserId) -> AppResult<i64> {
        self.bounded("total_post_likes", self.inner.total_post_likes(user_id))
            .await
    }

    async fn external_favorite_count(&self, owner_id: UserId) -> AppResult<i64> {
        self.bounded(
            "external_favorite_count",
            self.inner.external_favorite_count(owner_id),
        )
        .await
    }

    async fn update_user_rating(&self, user_id: UserId, rating: i64) -> AppResult<()> {
        self.bounded(
            "update_user_rating",
            self.inner.update_user_rating(user_id, rating),
        )
        .await
    }

    async fn try_acquire_run_lock(&self, kind: JobKind) -> AppResult<bool> {
        self.bounded("try_acquire_run_lock", self.inner.try_acquire_run_lock(kind))
            .await
    }

    async fn release_run_lock(&self, kind: JobKind) -> AppResult<()> {
        self.bounded("release_run_lock", self.inner.release_run_lock(kind))
            .await
    }
}
