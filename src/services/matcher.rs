use std::collections::{BTreeMap, BTreeSet};

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{GenreId, MovieGenreLink, MovieId},
    services::genre_resolver::ResolvedRule,
};

/// Whether a movie carrying `genres` satisfies the rule
///
/// Each required genre is its own AND clause; the optional set is a single OR
/// clause that only applies when non-empty.
pub fn movie_matches(rule: &ResolvedRule, genres: &BTreeSet<GenreId>) -> bool {
    let has_required = rule.required.iter().all(|id| genres.contains(id));
    let has_optional =
        rule.optional_or.is_empty() || rule.optional_or.iter().any(|id| genres.contains(id));

    has_required && has_optional
}

/// Evaluates the rule over a set of movie-genre links
///
/// `links` must contain every link of the rule's genres; links to other genres
/// are ignored.
pub fn match_movies(rule: &ResolvedRule, links: &[MovieGenreLink]) -> BTreeSet<MovieId> {
    let mut genres_by_movie: BTreeMap<MovieId, BTreeSet<GenreId>> = BTreeMap::new();
    for link in links {
        genres_by_movie
            .entry(link.movie_id)
            .or_default()
            .insert(link.genre_id);
    }

    genres_by_movie
        .into_iter()
        .filter(|(_, genres)| movie_matches(rule, genres))
        .map(|(movie_id, _)| movie_id)
        .collect()
}

/// Finds every catalog movie matching the rule
pub async fn find_matching_movies(
    store: &dyn CatalogStore,
    rule: &ResolvedRule,
) -> AppResult<BTreeSet<MovieId>> {
    let links = store.movie_genre_links(&rule.genre_ids()).await?;
    Ok(match_movies(rule, &links))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRIME: GenreId = 1;
    const DRAMA: GenreId = 2;
    const THRILLER: GenreId = 3;
    const HORROR: GenreId = 4;
    const COMEDY: GenreId = 5;
    const DETECTIVE: GenreId = 6;

    fn rule(required: &[GenreId], optional_or: &[GenreId]) -> ResolvedRule {
        ResolvedRule {
            required: required.iter().copied().collect(),
            optional_or: optional_or.iter().copied().collect(),
        }
    }

    fn tags(ids: &[GenreId]) -> BTreeSet<GenreId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_required_genres_are_conjunctive() {
        let crime_drama = rule(&[CRIME, DRAMA], &[]);
        assert!(!movie_matches(&crime_drama, &tags(&[CRIME])));
        assert!(movie_matches(&crime_drama, &tags(&[CRIME, DRAMA, THRILLER])));
    }

    #[test]
    fn test_optional_genres_are_disjunctive() {
        let scary = rule(&[], &[HORROR, THRILLER]);
        assert!(!movie_matches(&scary, &tags(&[COMEDY])));
        assert!(movie_matches(&scary, &tags(&[THRILLER])));
    }

    #[test]
    fn test_combined_rule_needs_both_clauses() {
        let detective = rule(&[DETECTIVE], &[THRILLER]);
        assert!(!movie_matches(&detective, &tags(&[DETECTIVE])));
        assert!(!movie_matches(&detective, &tags(&[THRILLER])));
        assert!(movie_matches(&detective, &tags(&[DETECTIVE, THRILLER])));
    }

    #[test]
    fn test_match_movies_groups_links() {
        let links = [
            MovieGenreLink { movie_id: 10, genre_id: CRIME },
            MovieGenreLink { movie_id: 10, genre_id: DRAMA },
            MovieGenreLink { movie_id: 11, genre_id: CRIME },
            MovieGenreLink { movie_id: 12, genre_id: DRAMA },
            MovieGenreLink { movie_id: 13, genre_id: DRAMA },
            MovieGenreLink { movie_id: 13, genre_id: CRIME },
        ];

        let matched = match_movies(&rule(&[CRIME, DRAMA], &[]), &links);
        assert_eq!(matched, BTreeSet::from([10, 13]));
    }

    #[test]
    fn test_no_links_no_matches() {
        assert!(match_movies(&rule(&[], &[COMEDY]), &[]).is_empty());
    }
}
