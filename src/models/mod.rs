pub mod catalog;
pub mod rule;
pub mod summary;

pub use catalog::{
    Compilation, CompilationFavorite, CompilationId, Genre, GenreId, Movie, MovieGenreLink,
    MovieId, Post, User, UserId,
};
pub use rule::{CompilationRule, RuleTable};
pub use summary::{
    CompilationOutcome, CompilationReport, CurationSummary, JobKind, JobRun, JobStatus,
    LinkFailure, ScoringSummary,
};
