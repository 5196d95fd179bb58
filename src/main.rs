use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};

use kinomatch_jobs::{
    config::Config,
    db::{create_pool, CatalogStore, PgCatalogStore, TimeoutStore},
    models::{JobStatus, RuleTable},
    services::{scheduler, BatchJob, CurationJob, JobOptions, ScoringJob},
    telemetry,
};

/// Command-line arguments for kinomatch-jobs
#[derive(Parser, Debug)]
#[command(name = "kinomatch-jobs")]
#[command(about = "Catalog curation and user scoring batch jobs")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON rule table, overrides RULES_PATH
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Compute results without writing to the database
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Rebuild system compilations from the rule table
    Curate,
    /// Recompute user ratings
    Score,
    /// Run curation, then scoring
    All,
    /// Stay resident and run both jobs on their cron schedules
    Schedule,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "Job run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env()?;

    let rules = match args.rules.as_ref().or(config.rules_path.as_ref()) {
        Some(path) => RuleTable::from_json_file(path)?,
        None => RuleTable::default(),
    };

    let pool = create_pool(
        &config.database_url,
        config.db_max_connections,
        config.store_timeout(),
    )
    .await
    .context("Failed to connect to the catalog database")?;
    info!(max_connections = config.db_max_connections, "Connected to catalog database");

    let store: Arc<dyn CatalogStore> = Arc::new(TimeoutStore::new(
        PgCatalogStore::new(pool.clone()),
        config.store_timeout(),
    ));
    let options = JobOptions {
        max_concurrency: config.max_concurrency,
        dry_run: args.dry_run,
    };
    let curation = Arc::new(CurationJob::new(store.clone(), Arc::new(rules), options));
    let scoring = Arc::new(ScoringJob::new(store, config.rating_weights(), options));

    let result = match args.command {
        Command::Curate => run_once(curation.as_ref()).await,
        Command::Score => run_once(scoring.as_ref()).await,
        Command::All => {
            // Independent jobs: a fatal curation run must not prevent scoring
            let curated = run_once(curation.as_ref()).await;
            let scored = run_once(scoring.as_ref()).await;
            curated.and(scored)
        }
        Command::Schedule => run_scheduled(&config, curation, scoring).await,
    };

    pool.close().await;
    info!("Database pool closed");

    result
}

async fn run_once(job: &dyn BatchJob) -> Result<()> {
    match job.execute().await {
        Ok(JobStatus::Completed { succeeded, failed }) => {
            info!(job = %job.kind(), succeeded, failed, "Job completed");
            Ok(())
        }
        Ok(JobStatus::Skipped) => {
            info!(job = %job.kind(), "Job skipped, another run is active");
            Ok(())
        }
        Err(e) => {
            error!(
                job = %job.kind(),
                error = %e,
                transient = e.is_transient(),
                "Job failed"
            );
            Err(anyhow::Error::new(e).context(format!("{} job failed", job.kind())))
        }
    }
}

async fn run_scheduled(
    config: &Config,
    curation: Arc<CurationJob>,
    scoring: Arc<ScoringJob>,
) -> Result<()> {
    let curation_cron = scheduler::parse_schedule(&config.curation_cron)?;
    let scoring_cron = scheduler::parse_schedule(&config.scoring_cron)?;

    let handles = [
        scheduler::spawn_schedule(curation, curation_cron),
        scheduler::spawn_schedule(scoring, scoring_cron),
    ];
    info!(
        curation = %config.curation_cron,
        scoring = %config.scoring_cron,
        "Scheduler started"
    );

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping scheduler");

    // Jobs hold store handles; they must be dropped before the pool can close
    for handle in handles {
        handle.abort();
        let _ = handle.await;
    }

    Ok(())
}
