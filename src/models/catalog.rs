use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub type MovieId = i32;
pub type GenreId = i32;
pub type CompilationId = i32;
pub type UserId = i32;

/// A catalog movie with the genres it is linked to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub genre_ids: BTreeSet<GenreId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    #[sqlx(rename = "genre_id")]
    pub id: GenreId,
    pub name: String,
}

/// One row of the movie-genre link table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MovieGenreLink {
    pub movie_id: MovieId,
    pub genre_id: GenreId,
}

/// A movie collection; `owner_id` is `None` for system compilations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Compilation {
    #[sqlx(rename = "collection_id")]
    pub id: CompilationId,
    pub title: String,
    #[sqlx(rename = "user_id")]
    pub owner_id: Option<UserId>,
}

impl Compilation {
    pub fn is_system(&self) -> bool {
        self.owner_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub rating: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i32,
    pub user_id: UserId,
    pub likes: i64,
}

/// A user marking a compilation as favorite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationFavorite {
    pub id: i32,
    pub user_id: UserId,
    pub compilation_id: CompilationId,
}
