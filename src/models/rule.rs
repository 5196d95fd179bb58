use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Genre-matching rule bound to a system compilation by title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompilationRule {
    /// A movie must carry every one of these genres
    #[serde(default)]
    pub required_genres: BTreeSet<String>,
    /// When non-empty, a movie must carry at least one of these genres
    #[serde(default)]
    pub optional_or_genres: BTreeSet<String>,
}

impl CompilationRule {
    pub fn new<R, O>(required: R, optional_or: O) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            required_genres: required.into_iter().map(Into::into).collect(),
            optional_or_genres: optional_or.into_iter().map(Into::into).collect(),
        }
    }

    /// A rule naming no genres at all matches nothing meaningful and is skipped
    pub fn is_empty(&self) -> bool {
        self.required_genres.is_empty() && self.optional_or_genres.is_empty()
    }

    /// Every genre name referenced by the rule
    pub fn genre_names(&self) -> BTreeSet<&str> {
        self.required_genres
            .iter()
            .chain(self.optional_or_genres.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Immutable mapping from compilation title to its rule
///
/// Titles are matched exactly and case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: BTreeMap<String, CompilationRule>,
}

impl RuleTable {
    pub fn new(rules: BTreeMap<String, CompilationRule>) -> Self {
        Self { rules }
    }

    pub fn get(&self, title: &str) -> Option<&CompilationRule> {
        self.rules.get(title)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CompilationRule)> {
        self.rules.iter()
    }

    pub fn from_json_str(json: &str) -> AppResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| AppError::InvalidInput(format!("Invalid rule table: {}", e)))
    }

    /// Loads a rule table from a JSON object of `title -> rule`
    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read rule table {}: {}",
                path.display(),
                e
            ))
        })?;
        let table = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), rules = table.len(), "Loaded rule table");
        Ok(table)
    }
}

impl Default for RuleTable {
    /// The catalog's standing system compilations
    fn default() -> Self {
        let none: [&str; 0] = [];
        let rules = [
            ("Жуткие фильмы", CompilationRule::new(none, ["ужасы", "триллер"])),
            (
                "Лучшие мультфильмы всех времен",
                CompilationRule::new(["мультфильм"], ["семейный", "фэнтези"]),
            ),
            (
                "Военные фильмы",
                CompilationRule::new(["военный"], ["драма", "история"]),
            ),
            ("Фильмы-мюзикл", CompilationRule::new(none, ["мюзикл", "музыкальный"])),
            ("Лучшие комедии", CompilationRule::new(none, ["комедия"])),
            (
                "Фильмы про супергероев",
                CompilationRule::new(none, ["фантастика", "боевик", "приключения"]),
            ),
            ("Фильмы про спорт", CompilationRule::new(none, ["спорт"])),
            (
                "Захватывающие детективы",
                CompilationRule::new(["детектив"], ["триллер"]),
            ),
            ("Криминальные драмы", CompilationRule::new(["криминал", "драма"], none)),
            ("Фантастические миры", CompilationRule::new(none, ["фантастика", "фэнтези"])),
            ("Дикий Запад", CompilationRule::new(none, ["вестерн", "приключения"])),
            (
                "Документальное кино",
                CompilationRule::new(none, ["документальный", "история"]),
            ),
        ];

        Self::new(
            rules
                .into_iter()
                .map(|(title, rule)| (title.to_string(), rule))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_table() {
        let table = RuleTable::default();
        assert_eq!(table.len(), 12);

        let crime = table.get("Криминальные драмы").unwrap();
        assert_eq!(crime.genre_names(), BTreeSet::from(["драма", "криминал"]));
        assert!(crime.optional_or_genres.is_empty());

        assert!(table.iter().all(|(_, rule)| !rule.is_empty()));
    }

    #[test]
    fn test_title_lookup_is_case_sensitive() {
        let table = RuleTable::default();
        assert!(table.get("Лучшие комедии").is_some());
        assert!(table.get("лучшие комедии").is_none());
        assert!(table.get("Лучшие комедии ").is_none());
    }

    #[test]
    fn test_parse_json() {
        let table = RuleTable::from_json_str(
            r#"{
                "Жуткие фильмы": { "optionalOrGenres": ["ужасы", "триллер"] },
                "Пустая": {}
            }"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.get("Пустая").unwrap().is_empty());
        assert_eq!(
            table.get("Жуткие фильмы").unwrap(),
            &CompilationRule::new(Vec::<String>::new(), ["триллер", "ужасы"])
        );
    }

    #[test]
    fn test_unknown_rule_field_rejected() {
        let result = RuleTable::from_json_str(r#"{ "X": { "excludedGenres": ["драма"] } }"#);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "Фильмы про спорт": {{ "optionalOrGenres": ["спорт"] }} }}"#
        )
        .unwrap();

        let table = RuleTable::from_json_file(file.path()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = RuleTable::from_json_file(Path::new("/nonexistent/rules.json"));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
