//! Site-Scribe main entry point
//!
//! This is the command-line interface for the Site-Scribe documentation crawler.

use anyhow::{bail, Context};
use clap::Parser;
use site_scribe::config::{load_config_with_hash, Config, JobConfig};
use site_scribe::crawler::HttpExtractor;
use site_scribe::jobs::{JobId, JobManager, JobState, JobStatus};
use site_scribe::output::FsDocumentWriter;
use site_scribe::storage::open_store;
use site_scribe::url::normalize_url;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Site-Scribe: a resumable website documentation crawler
///
/// Site-Scribe crawls each configured site breadth-first, writes one
/// markdown document per page, and checkpoints its progress so an
/// interrupted crawl resumes where it left off.
#[derive(Parser, Debug)]
#[command(name = "site-scribe")]
#[command(version)]
#[command(about = "A resumable website documentation crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start new jobs instead of resuming paused ones
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "status")]
    dry_run: bool,

    /// Show the persisted jobs and exit
    #[arg(long, conflicts_with = "dry_run")]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.status {
        handle_status(&config)
    } else {
        handle_crawl(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_scribe=info,warn"),
            1 => EnvFilter::new("site_scribe=debug,info"),
            2 => EnvFilter::new("site_scribe=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the planned jobs
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Site-Scribe Dry Run ===\n");

    println!("Crawler Defaults:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Delay: {}s", config.crawler.delay_seconds);
    println!("  Checkpoint every: {} pages", config.crawler.checkpoint_every);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Documents: {}", config.output.output_dir);
    println!(
        "  State: {} ({:?})",
        config.output.state_path, config.output.state_backend
    );

    let jobs = config.job_configs();
    println!("\nSites ({}):", jobs.len());
    for job in &jobs {
        job.validate()
            .with_context(|| format!("Invalid site {}", job.root_url))?;
        println!(
            "  - {} (depth {}, {} pages, {}s delay)",
            job.root_url, job.max_depth, job.max_pages, job.delay_seconds
        );
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --status mode: lists persisted jobs
fn handle_status(config: &Config) -> anyhow::Result<()> {
    let store = open_store(&config.output).context("Failed to open state store")?;
    let records = store.list()?;

    println!("State: {}\n", config.output.state_path);
    if records.is_empty() {
        println!("No jobs recorded");
        return Ok(());
    }

    for record in records {
        let status = JobStatus::from_record(&record);
        let state = &record.state;
        println!(
            "{}  {:<9}  {}  {} processed, {} pending",
            status.job_id,
            status.state.to_string(),
            status.root_url,
            status.pages_processed,
            status.pending
        );
        println!(
            "    {} written, {} skipped, {} failed, {} links dropped",
            state.pages_succeeded(),
            state.pages_skipped(),
            status.pages_failed,
            state.dropped.total()
        );
        if status.has_page_failures() {
            println!("    warning: some pages failed; see the log for details");
        }
        if let Some(error) = &status.error {
            println!("    error: {}", error);
        }
    }
    Ok(())
}

/// Finds the newest paused job crawling the same root
fn find_resumable(manager: &JobManager, job: &JobConfig) -> Option<JobId> {
    let root = normalize_url(&job.root_url).ok()?;
    manager
        .list()
        .into_iter()
        .filter(|status| status.state == JobState::Paused)
        .filter(|status| normalize_url(&status.root_url).ok().as_ref() == Some(&root))
        .last()
        .map(|status| status.job_id)
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    let store = open_store(&config.output).context("Failed to open state store")?;
    let extractor = Arc::new(HttpExtractor::new(&config.user_agent)?);
    let writer = Arc::new(FsDocumentWriter::new(&config.output.output_dir));
    let manager = Arc::new(JobManager::new(store, extractor, writer));

    let recovered = manager.recover()?;
    if !recovered.is_empty() {
        tracing::info!("Found {} jobs from previous runs", recovered.len());
    }
    if fresh {
        tracing::info!("Starting fresh jobs (paused jobs are left untouched)");
    }

    let mut started = Vec::new();
    for job in config.job_configs() {
        let root_url = job.root_url.clone();
        let resumable = if fresh {
            None
        } else {
            find_resumable(&manager, &job)
        };

        let result = match resumable {
            Some(job_id) => {
                tracing::info!("Resuming job {} for {}", job_id, root_url);
                manager.start(job_id).await.map(|_| job_id)
            }
            None => manager.launch(job).await,
        };

        match result {
            Ok(job_id) => started.push(job_id),
            Err(e) => tracing::error!("Could not start job for {}: {}", root_url, e),
        }
    }

    if started.is_empty() {
        bail!("No jobs could be started");
    }

    let waiter = {
        let manager = Arc::clone(&manager);
        let ids = started.clone();
        async move {
            for job_id in ids {
                let _ = manager.wait(job_id).await;
            }
        }
    };

    tokio::select! {
        _ = waiter => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, pausing jobs");
            let paused = manager.pause_all().await;
            tracing::info!("Paused {} jobs; run again to resume", paused.len());
        }
    }

    let mut failed = 0;
    for job_id in started {
        let status = manager.status(job_id)?;
        println!(
            "{}  {:<9}  {}  {} processed, {} failed",
            status.job_id,
            status.state.to_string(),
            status.root_url,
            status.pages_processed,
            status.pages_failed
        );
        if let Some(error) = &status.error {
            println!("    error: {}", error);
        }
        if status.state == JobState::Failed {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} jobs failed", failed);
    }
    Ok(())
}
