//! Category-Harvest main entry point
//!
//! This is the command-line interface for the Category-Harvest corpus builder.

use anyhow::Context;
use category_harvest::config::{load_config_with_hash, Config};
use category_harvest::crawler::run_harvest;
use category_harvest::output::{load_statistics, print_statistics};
use category_harvest::storage::{open_existing_store, open_store};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Category-Harvest: a polite category-graph corpus builder
///
/// Category-Harvest walks the category graph of a MediaWiki site from a root
/// category, downloads every reachable article under a global rate limit,
/// and keeps deduplicated documents in a resumable SQLite store.
#[derive(Parser, Debug)]
#[command(name = "category-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite category-graph corpus builder", long_about = None)]
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

    /// Skip category exploration and continue processing queued pages
    #[arg(long)]
    resume: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, conflicts_with_all = ["stats", "resume"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "resume"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration before logging so the log file is known
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let _log_guard = setup_logging(cli.verbose, cli.quiet, config.output.log_file.as_deref())?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, config_hash, cli.resume).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// When `log_file` is set, a second plain-text layer writes to that file. The
/// returned guard must be held until exit so buffered lines are flushed.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_file: Option<&str>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("category_harvest=info,warn"),
            1 => EnvFilter::new("category_harvest=debug,info"),
            2 => EnvFilter::new("category_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let path = Path::new(path);
            let directory = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
            std::fs::create_dir_all(&directory)
                .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

            let appender = RollingFileAppender::new(Rotation::NEVER, directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) {
    println!("=== Category-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Root category: {}", config.crawler.root_category);
    match config.crawler.document_cap() {
        Some(cap) => println!("  Max documents: {}", cap),
        None => println!("  Max documents: unlimited"),
    }
    println!("  Min words: {}", config.crawler.min_words);
    println!("  Parallel workers: {}", config.crawler.parallel_workers);
    println!("  Max attempts per page: {}", config.crawler.max_attempts);
    println!("  Lease timeout: {}s", config.crawler.lease_timeout_secs);

    println!("\nAPI:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  User agent: {}", config.api.user_agent);
    println!("  Request delay: {}ms", config.api.request_delay_ms);
    println!("  Max retries: {}", config.api.max_retries);
    println!("  Category prefixes: {}", config.api.category_prefixes.join(", "));

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  HTML directory: {}", config.output.html_directory);
    println!("  Text directory: {}", config.output.text_directory);
    println!("  Metadata: {}", config.output.metadata_file);
    if let Some(log_file) = &config.output.log_file {
        println!("  Log file: {}", log_file);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_existing_store(
        Path::new(&config.output.database_path),
        config.crawler.max_attempts,
    )
    .context("Failed to open database")?;

    let (stats, run) = load_statistics(&store)?;
    print_statistics(&stats, run.as_ref());

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String, resume: bool) -> anyhow::Result<()> {
    let database_path = config.output.database_path.clone();
    let max_attempts = config.crawler.max_attempts;

    let report = run_harvest(config, config_hash, resume)
        .await
        .context("Harvest failed")?;

    if let Some(explore) = &report.explore {
        tracing::info!(
            "Explored {} categories, queued {} pages ({} listing failures)",
            explore.categories_explored,
            explore.pages_added,
            explore.listing_failures
        );
    }
    if report.interrupted {
        tracing::warn!("Harvest interrupted; rerun with --resume to continue");
    }

    let store = open_store(Path::new(&database_path), max_attempts)?;
    let (stats, run) = load_statistics(&store)?;
    print_statistics(&stats, run.as_ref());

    Ok(())
}
