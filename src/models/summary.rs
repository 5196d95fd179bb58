use std::fmt::Display;

use serde::Serialize;

use super::catalog::{CompilationId, MovieId, UserId};

/// The two batch jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Curation,
    Scoring,
}

impl JobKind {
    /// Key for the run-level advisory lock
    pub fn lock_key(self) -> i64 {
        match self {
            JobKind::Curation => 0x4b4d_0001,
            JobKind::Scoring => 0x4b4d_0002,
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Curation => write!(f, "curation"),
            JobKind::Scoring => write!(f, "scoring"),
        }
    }
}

/// Result of one triggered run
#[derive(Debug, Clone, PartialEq)]
pub enum JobRun<T> {
    Completed(T),
    /// Another instance held the run lock
    Skipped,
}

impl<T> JobRun<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            JobRun::Completed(summary) => Some(summary),
            JobRun::Skipped => None,
        }
    }
}

/// Uniform view of a run, used by the CLI and the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Completed { succeeded: usize, failed: usize },
    Skipped,
}

/// A movie link that could not be inserted during a rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkFailure {
    pub movie_id: MovieId,
    pub error: String,
}

/// What happened to one system compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompilationOutcome {
    Rebuilt {
        removed: u64,
        inserted: usize,
        failed_links: Vec<LinkFailure>,
    },
    /// Matched but not written
    DryRun { matched: usize },
    NoRule,
    EmptyRule,
    UnresolvedGenres { missing: Vec<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationReport {
    pub compilation_id: CompilationId,
    pub title: String,
    #[serde(flatten)]
    pub outcome: CompilationOutcome,
}

/// Summary of a curation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurationSummary {
    pub reports: Vec<CompilationReport>,
    /// Worker tasks that died before producing a report
    pub lost_tasks: usize,
}

impl CurationSummary {
    pub fn rebuilt(&self) -> usize {
        self.count(|o| matches!(o, CompilationOutcome::Rebuilt { .. } | CompilationOutcome::DryRun { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                CompilationOutcome::NoRule
                    | CompilationOutcome::EmptyRule
                    | CompilationOutcome::UnresolvedGenres { .. }
            )
        })
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CompilationOutcome::Failed { .. })) + self.lost_tasks
    }

    /// Link inserts that failed inside otherwise successful rebuilds
    pub fn link_failures(&self) -> usize {
        self.reports
            .iter()
            .map(|r| match &r.outcome {
                CompilationOutcome::Rebuilt { failed_links, .. } => failed_links.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn report_for(&self, compilation_id: CompilationId) -> Option<&CompilationReport> {
        self.reports
            .iter()
            .find(|r| r.compilation_id == compilation_id)
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::Completed {
            succeeded: self.rebuilt(),
            failed: self.failed(),
        }
    }

    fn count(&self, pred: impl Fn(&CompilationOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Summary of a scoring run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoringSummary {
    pub updated: usize,
    pub failed_users: Vec<UserId>,
    pub lost_tasks: usize,
}

impl ScoringSummary {
    pub fn failed(&self) -> usize {
        self.failed_users.len() + self.lost_tasks
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::Completed {
            succeeded: self.updated,
            failed: self.failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: CompilationId, outcome: CompilationOutcome) -> CompilationReport {
        CompilationReport {
            compilation_id: id,
            title: format!("compilation {}", id),
            outcome,
        }
    }

    #[test]
    fn test_curation_counts() {
        let summary = CurationSummary {
            reports: vec![
                report(
                    1,
                    CompilationOutcome::Rebuilt {
                        removed: 3,
                        inserted: 2,
                        failed_links: vec![LinkFailure {
                            movie_id: 9,
                            error: "foreign key".to_string(),
                        }],
                    },
                ),
                report(2, CompilationOutcome::NoRule),
                report(
                    3,
                    CompilationOutcome::UnresolvedGenres {
                        missing: vec!["ужасы".to_string()],
                    },
                ),
                report(
                    4,
                    CompilationOutcome::Failed {
                        error: "timeout".to_string(),
                    },
                ),
            ],
            lost_tasks: 0,
        };

        assert_eq!(summary.rebuilt(), 1);
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.link_failures(), 1);
        assert_eq!(
            summary.status(),
            JobStatus::Completed {
                succeeded: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_report_serialization() {
        let json = serde_json::to_value(report(5, CompilationOutcome::EmptyRule)).unwrap();
        assert_eq!(json["compilation_id"], 5);
        assert_eq!(json["outcome"], "empty_rule");
    }

    #[test]
    fn test_lock_keys_distinct() {
        assert_ne!(JobKind::Curation.lock_key(), JobKind::Scoring.lock_key());
        assert_eq!(JobKind::Scoring.to_string(), "scoring");
    }
}
