use std::collections::HashMap;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Connection, PgConnection, PgPool};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::{Compilation, CompilationId, Genre, GenreId, JobKind, MovieGenreLink, MovieId, UserId},
};

/// Creates a PostgreSQL connection pool
///
/// One pool is created per process run and closed by the caller on exit.
pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;

    Ok(pool)
}

// `posts` is mapped by the web application's ORM without a column rename,
// so its owner column keeps the camel-case field name.
const POST_LIKES_QUERY: &str =
    r#"SELECT COALESCE(SUM(likes), 0)::BIGINT FROM posts WHERE "userId" = $1"#;

/// Catalog store backed by the application's PostgreSQL schema
pub struct PgCatalogStore {
    pool: PgPool,
    // Advisory locks are session-scoped. A lock session is detached from the
    // pool and never returned to it: it is closed once the lock is released,
    // or dropped on any failure, which ends the session and its locks.
    lock_sessions: Mutex<HashMap<JobKind, PgConnection>>,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn system_compilations(&self) -> AppResult<Vec<Compilation>> {
        let compilations = sqlx::query_as::<_, Compilation>(
            "SELECT collection_id, title, user_id
             FROM user_movie_collections
             WHERE user_id IS NULL
             ORDER BY collection_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(compilations)
    }

    async fn genres_by_names(&self, names: &[String]) -> AppResult<Vec<Genre>> {
        let genres =
            sqlx::query_as::<_, Genre>("SELECT genre_id, name FROM genres WHERE name = ANY($1)")
                .bind(names)
                .fetch_all(&self.pool)
                .await?;

        Ok(genres)
    }

    async fn movie_genre_links(&self, genre_ids: &[GenreId]) -> AppResult<Vec<MovieGenreLink>> {
        let links = sqlx::query_as::<_, MovieGenreLink>(
            "SELECT movie_id, genre_id FROM movie_genres WHERE genre_id = ANY($1)",
        )
        .bind(genre_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    async fn delete_compilation_links(&self, compilation_id: CompilationId) -> AppResult<u64> {
        let removed = sqlx::query("DELETE FROM collection_movies WHERE collection_id = $1")
            .bind(compilation_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(removed)
    }

    async fn insert_compilation_link(
        &self,
        compilation_id: CompilationId,
        movie_id: MovieId,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO collection_movies (collection_id, movie_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(compilation_id)
        .bind(movie_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn user_ids(&self) -> AppResult<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, UserId>("SELECT user_id FROM users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn total_post_likes(&self, user_id: UserId) -> AppResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(POST_LIKES_QUERY)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    async fn external_favorite_count(&self, owner_id: UserId) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)
             FROM user_collection_favorites f
             JOIN user_movie_collections c ON c.collection_id = f.collection_id
             WHERE c.user_id = $1 AND f.user_id <> $1",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn update_user_rating(&self, user_id: UserId, rating: i64) -> AppResult<()> {
        let rating = i32::try_from(rating).map_err(|_| {
            AppError::InvalidInput(format!(
                "Rating {} for user {} does not fit the rating column",
                rating, user_id
            ))
        })?;

        let updated = sqlx::query("UPDATE users SET rating = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(rating)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound(format!("User {}", user_id)));
        }

        Ok(())
    }

    async fn try_acquire_run_lock(&self, kind: JobKind) -> AppResult<bool> {
        let mut sessions = self.lock_sessions.lock().await;
        if sessions.contains_key(&kind) {
            return Ok(false);
        }

        let mut conn = self.pool.acquire().await?.detach();
        let acquired = match sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(kind.lock_key())
            .fetch_one(&mut conn)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                close_session(conn, kind).await;
                return Err(e.into());
            }
        };

        if acquired {
            sessions.insert(kind, conn);
        } else {
            close_session(conn, kind).await;
        }

        Ok(acquired)
    }

    async fn release_run_lock(&self, kind: JobKind) -> AppResult<()> {
        let Some(mut conn) = self.lock_sessions.lock().await.remove(&kind) else {
            return Ok(());
        };

        let unlocked = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(kind.lock_key())
            .fetch_one(&mut conn)
            .await;

        // Ending the session frees the lock even when the unlock query failed
        close_session(conn, kind).await;

        if !unlocked? {
            warn!(job = %kind, "Run lock was not held by this session");
        }

        Ok(())
    }
}

async fn close_session(conn: PgConnection, kind: JobKind) {
    if let Err(e) = conn.close().await {
        warn!(job = %kind, error = %e, "Failed to close run lock session");
    }
}
