use std::collections::{BTreeSet, HashMap};

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{CompilationRule, Genre, GenreId},
};

/// A rule whose genre names have all been mapped to catalog ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule {
    pub required: BTreeSet<GenreId>,
    pub optional_or: BTreeSet<GenreId>,
}

impl ResolvedRule {
    /// Every genre id the rule depends on
    pub fn genre_ids(&self) -> Vec<GenreId> {
        self.required.union(&self.optional_or).copied().collect()
    }
}

/// Outcome of resolving a rule against the genre table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedRule),
    /// The rule names no genres
    EmptyRule,
    /// At least one genre name does not exist in the catalog
    Unresolved { missing: Vec<String> },
}

/// Maps the rule's genre names onto catalog genres
///
/// A rule is only usable when every name it mentions resolves; matching on a
/// subset of the intended genres would silently widen or narrow the
/// compilation.
pub fn resolve_with(rule: &CompilationRule, genres: &[Genre]) -> Resolution {
    if rule.is_empty() {
        return Resolution::EmptyRule;
    }

    let by_name: HashMap<&str, GenreId> = genres
        .iter()
        .map(|g| (g.name.as_str(), g.id))
        .collect();

    let missing: Vec<String> = rule
        .genre_names()
        .into_iter()
        .filter(|name| !by_name.contains_key(name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Resolution::Unresolved { missing };
    }

    let lookup = |names: &BTreeSet<String>| -> BTreeSet<GenreId> {
        names
            .iter()
            .filter_map(|name| by_name.get(name.as_str()).copied())
            .collect()
    };

    Resolution::Resolved(ResolvedRule {
        required: lookup(&rule.required_genres),
        optional_or: lookup(&rule.optional_or_genres),
    })
}

/// Fetches the rule's genres from the store and resolves them
pub async fn resolve(store: &dyn CatalogStore, rule: &CompilationRule) -> AppResult<Resolution> {
    if rule.is_empty() {
        return Ok(Resolution::EmptyRule);
    }

    let names: Vec<String> = rule.genre_names().into_iter().map(str::to_string).collect();
    let genres = store.genres_by_names(&names).await?;

    Ok(resolve_with(rule, &genres))
}
