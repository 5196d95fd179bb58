use std::sync::Arc;

use tracing::{error, info, info_span, instrument, warn, Instrument};

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{
        Compilation, CompilationOutcome, CompilationReport, CompilationRule, CurationSummary,
        JobKind, JobRun, JobStatus, RuleTable,
    },
    services::{
        genre_resolver::{self, Resolution},
        matcher, rebuilder,
        runner::{self, BatchJob},
        JobOptions,
    },
    telemetry::RunId,
};

/// Re-derives the membership of every system compilation from the rule table
#[derive(Clone)]
pub struct CurationJob {
    store: Arc<dyn CatalogStore>,
    rules: Arc<RuleTable>,
    options: JobOptions,
}

impl CurationJob {
    pub fn new(store: Arc<dyn CatalogStore>, rules: Arc<RuleTable>, options: JobOptions) -> Self {
        Self {
            store,
            rules,
            options,
        }
    }

    /// Runs one full curation sweep
    ///
    /// Fails only when the list of system compilations cannot be fetched;
    /// every per-compilation failure is reported in the summary.
    pub async fn run(&self) -> AppResult<JobRun<CurationSummary>> {
        let run_id = RunId::new();
        let span = info_span!("curation_job", %run_id, dry_run = self.options.dry_run);

        runner::run_exclusive(self.store.as_ref(), JobKind::Curation, self.sweep())
            .instrument(span)
            .await
    }

    async fn sweep(&self) -> AppResult<CurationSummary> {
        info!(rules = self.rules.len(), "Starting curation of system compilations");

        let compilations = self.store.system_compilations().await.map_err(|e| {
            error!(error = %e, "Failed to fetch system compilations");
            e
        })?;
        info!(count = compilations.len(), "Fetched system compilations");

        let (mut reports, lost_tasks) = runner::for_each_bounded(
            compilations,
            self.options.max_concurrency,
            |compilation| {
                let store = self.store.clone();
                let rules = self.rules.clone();
                let dry_run = self.options.dry_run;
                async move { curate_compilation(store.as_ref(), &rules, compilation, dry_run).await }
            },
        )
        .await?;
        reports.sort_by_key(|r| r.compilation_id);

        let summary = CurationSummary {
            reports,
            lost_tasks,
        };

        info!(
            rebuilt = summary.rebuilt(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            link_failures = summary.link_failures(),
            "Curation finished"
        );

        Ok(summary)
    }
}

#[async_trait::async_trait]
impl BatchJob for CurationJob {
    fn kind(&self) -> JobKind {
        JobKind::Curation
    }

    async fn execute(&self) -> AppResult<JobStatus> {
        Ok(match self.run().await? {
            JobRun::Completed(summary) => summary.status(),
            JobRun::Skipped => JobStatus::Skipped,
        })
    }
}

/// Processes one compilation; never fails, the outcome carries any error
#[instrument(skip_all, fields(compilation_id = compilation.id, title = %compilation.title))]
pub async fn curate_compilation(
    store: &dyn CatalogStore,
    rules: &RuleTable,
    compilation: Compilation,
    dry_run: bool,
) -> CompilationReport {
    let outcome = match rules.get(&compilation.title) {
        None => {
            info!("No rule for compilation");
            CompilationOutcome::NoRule
        }
        Some(rule) => match apply_rule(store, rule, &compilation, dry_run).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Failed to curate compilation");
                CompilationOutcome::Failed {
                    error: e.to_string(),
                }
            }
        },
    };

    CompilationReport {
        compilation_id: compilation.id,
        title: compilation.title,
        outcome,
    }
}

async fn apply_rule(
    store: &dyn CatalogStore,
    rule: &CompilationRule,
    compilation: &Compilation,
    dry_run: bool,
) -> AppResult<CompilationOutcome> {
    let resolved = match genre_resolver::resolve(store, rule).await? {
        Resolution::Resolved(resolved) => resolved,
        Resolution::EmptyRule => {
            info!("Rule names no genres, skipping");
            return Ok(CompilationOutcome::EmptyRule);
        }
        Resolution::Unresolved { missing } => {
            warn!(?missing, "Rule genres not found in catalog, leaving links untouched");
            return Ok(CompilationOutcome::UnresolvedGenres { missing });
        }
    };

    let movies = matcher::find_matching_movies(store, &resolved).await?;
    info!(matched = movies.len(), "Matched movies for compilation");

    if dry_run {
        return Ok(CompilationOutcome::DryRun {
            matched: movies.len(),
        });
    }

    let rebuilt = rebuilder::rebuild_compilation(store, compilation.id, &movies).await?;
    if rebuilt.is_complete() {
        info!(
            removed = rebuilt.removed,
            inserted = rebuilt.inserted.len(),
            "Rebuilt compilation"
        );
    } else {
        warn!(
            removed = rebuilt.removed,
            inserted = rebuilt.inserted.len(),
            failed = rebuilt.failed.len(),
            "Rebuilt compilation with failed links"
        );
    }

    Ok(CompilationOutcome::Rebuilt {
        removed: rebuilt.removed,
        inserted: rebuilt.inserted.len(),
        failed_links: rebuilt.failed,
    })
}
