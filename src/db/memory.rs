use std::collections::{BTreeMap, BTreeSet, HashSet};

use tokio::sync::RwLock;

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::{
        Compilation, CompilationFavorite, CompilationId, Genre, GenreId, JobKind, Movie,
        MovieGenreLink, MovieId, Post, User, UserId,
    },
};

/// In-process catalog store
///
/// Holds the same entities as the relational schema behind a lock. Used for
/// tests and local runs; faults can be injected per compilation, link or user
/// to exercise the jobs' failure isolation.
#[derive(Default)]
pub struct MemoryCatalogStore {
    inner: RwLock<MemoryCatalog>,
}

#[derive(Default)]
struct MemoryCatalog {
    genres: BTreeMap<GenreId, Genre>,
    movies: BTreeMap<MovieId, Movie>,
    compilations: BTreeMap<CompilationId, Compilation>,
    compilation_links: BTreeMap<CompilationId, BTreeSet<MovieId>>,
    users: BTreeMap<UserId, User>,
    posts: Vec<Post>,
    favorites: Vec<CompilationFavorite>,
    held_locks: HashSet<JobKind>,
    faults: Faults,
    next_id: i32,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    link_deletes: HashSet<CompilationId>,
    link_inserts: HashSet<(CompilationId, MovieId)>,
    users: HashSet<UserId>,
}

impl MemoryCatalog {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_available(&self) -> AppResult<()> {
        if self.faults.unavailable {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_genre(&self, name: &str) -> GenreId {
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        inner.genres.insert(
            id,
            Genre {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub async fn add_movie(&self, title: &str, genre_ids: &[GenreId]) -> MovieId {
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        inner.movies.insert(
            id,
            Movie {
                id,
                title: title.to_string(),
                genre_ids: genre_ids.iter().copied().collect(),
            },
        );
        id
    }

    pub async fn add_compilation(&self, title: &str, owner_id: Option<UserId>) -> CompilationId {
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        inner.compilations.insert(
            id,
            Compilation {
                id,
                title: title.to_string(),
                owner_id,
            },
        );
        id
    }

    /// Links a movie directly, bypassing the jobs
    pub async fn link_movie(&self, compilation_id: CompilationId, movie_id: MovieId) {
        let mut inner = self.inner.write().await;
        inner
            .compilation_links
            .entry(compilation_id)
            .or_default()
            .insert(movie_id);
    }

    pub async fn add_user(&self, username: &str) -> UserId {
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        inner.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                rating: 0,
            },
        );
        id
    }

    pub async fn add_post(&self, user_id: UserId, likes: i64) -> i32 {
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        inner.posts.push(Post { id, user_id, likes });
        id
    }

    pub async fn add_favorite(&self, user_id: UserId, compilation_id: CompilationId) -> i32 {
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        inner.favorites.push(CompilationFavorite {
            id,
            user_id,
            compilation_id,
        });
        id
    }

    pub async fn set_rating(&self, user_id: UserId, rating: i64) {
        if let Some(user) = self.inner.write().await.users.get_mut(&user_id) {
            user.rating = rating;
        }
    }

    pub async fn links_of(&self, compilation_id: CompilationId) -> BTreeSet<MovieId> {
        self.inner
            .read()
            .await
            .compilation_links
            .get(&compilation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn rating_of(&self, user_id: UserId) -> Option<i64> {
        self.inner.read().await.users.get(&user_id).map(|u| u.rating)
    }

    /// Makes every call fail as if the database were unreachable
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.faults.unavailable = unavailable;
    }

    pub async fn fail_link_deletes_for(&self, compilation_id: CompilationId) {
        self.inner
            .write()
            .await
            .faults
            .link_deletes
            .insert(compilation_id);
    }

    pub async fn fail_link_insert(&self, compilation_id: CompilationId, movie_id: MovieId) {
        self.inner
            .write()
            .await
            .faults
            .link_inserts
            .insert((compilation_id, movie_id));
    }

    pub async fn fail_user(&self, user_id: UserId) {
        self.inner.write().await.faults.users.insert(user_id);
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn system_compilations(&self) -> AppResult<Vec<Compilation>> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        Ok(inner
            .compilations
            .values()
            .filter(|c| c.is_system())
            .cloned()
            .collect())
    }

    async fn genres_by_names(&self, names: &[String]) -> AppResult<Vec<Genre>> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        Ok(inner
            .genres
            .values()
            .filter(|g| names.contains(&g.name))
            .cloned()
            .collect())
    }

    async fn movie_genre_links(&self, genre_ids: &[GenreId]) -> AppResult<Vec<MovieGenreLink>> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        let mut links = Vec::new();
        for movie in inner.movies.values() {
            for &genre_id in movie.genre_ids.iter().filter(|id| genre_ids.contains(id)) {
                links.push(MovieGenreLink {
                    movie_id: movie.id,
                    genre_id,
                });
            }
        }
        Ok(links)
    }

    async fn delete_compilation_links(&self, compilation_id: CompilationId) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        inner.check_available()?;
        if inner.faults.link_deletes.contains(&compilation_id) {
            return Err(AppError::Internal(format!(
                "Injected delete failure for compilation {}",
                compilation_id
            )));
        }
        let removed = inner
            .compilation_links
            .remove(&compilation_id)
            .map_or(0, |links| links.len() as u64);
        Ok(removed)
    }

    async fn insert_compilation_link(
        &self,
        compilation_id: CompilationId,
        movie_id: MovieId,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.check_available()?;
        if inner.faults.link_inserts.contains(&(compilation_id, movie_id)) {
            return Err(AppError::Internal(format!(
                "Injected insert failure for movie {}",
                movie_id
            )));
        }
        if !inner.compilations.contains_key(&compilation_id) {
            return Err(AppError::NotFound(format!("Compilation {}", compilation_id)));
        }
        if !inner.movies.contains_key(&movie_id) {
            return Err(AppError::NotFound(format!("Movie {}", movie_id)));
        }
        inner
            .compilation_links
            .entry(compilation_id)
            .or_default()
            .insert(movie_id);
        Ok(())
    }

    async fn user_ids(&self) -> AppResult<Vec<UserId>> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        Ok(inner.users.keys().copied().collect())
    }

    async fn total_post_likes(&self, user_id: UserId) -> AppResult<i64> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        if inner.faults.users.contains(&user_id) {
            return Err(AppError::Internal(format!(
                "Injected failure for user {}",
                user_id
            )));
        }
        Ok(inner
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.likes)
            .sum())
    }

    async fn external_favorite_count(&self, owner_id: UserId) -> AppResult<i64> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        let count = inner
            .favorites
            .iter()
            .filter(|f| f.user_id != owner_id)
            .filter(|f| {
                inner
                    .compilations
                    .get(&f.compilation_id)
                    .is_some_and(|c| c.owner_id == Some(owner_id))
            })
            .count();
        Ok(count as i64)
    }

    async fn update_user_rating(&self, user_id: UserId, rating: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.check_available()?;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        user.rating = rating;
        Ok(())
    }

    async fn try_acquire_run_lock(&self, kind: JobKind) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        inner.check_available()?;
        Ok(inner.held_locks.insert(kind))
    }

    async fn release_run_lock(&self, kind: JobKind) -> AppResult<()> {
        self.inner.write().await.held_locks.remove(&kind);
        Ok(())
    }
}
