use crate::{
    error::AppResult,
    models::{Compilation, CompilationId, Genre, GenreId, JobKind, MovieGenreLink, MovieId, UserId},
};

/// Catalog store gateway
///
/// Everything the curation and scoring jobs read from or write to the catalog
/// database goes through this trait, so a job can be handed a PostgreSQL
/// store in production and an in-memory one in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Compilations with no owner, ordered by id
    async fn system_compilations(&self) -> AppResult<Vec<Compilation>>;

    /// Genres whose display name is exactly one of `names`
    async fn genres_by_names(&self, names: &[String]) -> AppResult<Vec<Genre>>;

    /// Movie-genre links whose genre is one of `genre_ids`
    async fn movie_genre_links(&self, genre_ids: &[GenreId]) -> AppResult<Vec<MovieGenreLink>>;

    /// Removes every movie link of a compilation, returning how many were removed
    async fn delete_compilation_links(&self, compilation_id: CompilationId) -> AppResult<u64>;

    /// Adds one movie link; inserting an existing link is not an error
    async fn insert_compilation_link(
        &self,
        compilation_id: CompilationId,
        movie_id: MovieId,
    ) -> AppResult<()>;

    async fn user_ids(&self) -> AppResult<Vec<UserId>>;

    /// Sum of likes over the user's posts, 0 without posts
    async fn total_post_likes(&self, user_id: UserId) -> AppResult<i64>;

    /// Favorites on compilations owned by `owner_id`, excluding the owner's own
    async fn external_favorite_count(&self, owner_id: UserId) -> AppResult<i64>;

    async fn update_user_rating(&self, user_id: UserId, rating: i64) -> AppResult<()>;

    /// Takes the run lock for a job kind; `false` when another run holds it
    async fn try_acquire_run_lock(&self, kind: JobKind) -> AppResult<bool>;

    async fn release_run_lock(&self, kind: JobKind) -> AppResult<()>;
}
