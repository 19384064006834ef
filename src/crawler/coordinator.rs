//! Harvest coordinator - main orchestration logic
//!
//! This module ties the phases of a harvest together:
//! - Opening the store, client and sink
//! - Recording the run and releasing claims left behind by a dead process
//! - Phase 1: category exploration (skipped on resume)
//! - Phase 2: the page worker pool
//! - Handling Ctrl-C by letting workers finish their current page

use crate::api::RateLimitedClient;
use crate::config::Config;
use crate::crawler::explorer::{CategoryExplorer, ExploreReport};
use crate::crawler::worker::{run_pool, PageProcessor, PoolReport};
use crate::crawler::Shutdown;
use crate::output::{DocumentSink, FileSink};
use crate::storage::{RunStatus, SqliteStore, StateStore};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;

/// Summary of one harvest run
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub run_id: i64,
    /// Claims from a previous process moved back to Failed at startup
    pub orphans_released: u64,
    /// Absent when exploration was skipped
    pub explore: Option<ExploreReport>,
    pub pool: PoolReport,
    pub interrupted: bool,
}

/// Main harvest coordinator
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    store: Arc<dyn StateStore>,
    client: Arc<RateLimitedClient>,
    sink: Arc<dyn DocumentSink>,
    shutdown: Shutdown,
}

impl Coordinator {
    /// Creates a coordinator backed by the configured database and directories
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to open the store, client or sink
    pub fn new(config: Config, config_hash: String) -> Result<Self, HarvestError> {
        let store = SqliteStore::new(
            Path::new(&config.output.database_path),
            config.crawler.max_attempts,
        )?
        .with_lease_timeout(config.crawler.lease_timeout());
        let client = RateLimitedClient::new(&config.api)?;
        let sink = FileSink::from_config(&config.output)?;

        Ok(Self::with_components(
            config,
            config_hash,
            Arc::new(store),
            Arc::new(client),
            Arc::new(sink),
        ))
    }

    /// Creates a coordinator from already constructed parts
    pub fn with_components(
        config: Config,
        config_hash: String,
        store: Arc<dyn StateStore>,
        client: Arc<RateLimitedClient>,
        sink: Arc<dyn DocumentSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_hash,
            store,
            client,
            sink,
            shutdown: Shutdown::new(),
        }
    }

    /// Handle that stops the harvest when requested
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Runs a complete harvest
    ///
    /// # Arguments
    ///
    /// * `resume` - Skip category exploration and only drain the page queue
    ///
    /// The run row is finished as `completed`, `interrupted` or `failed`
    /// depending on how the harvest ends.
    pub async fn run(&self, resume: bool) -> Result<HarvestReport, HarvestError> {
        let run_id = self.store.create_run(&self.config_hash, resume)?;
        tracing::info!("Starting harvest run {} (resume: {})", run_id, resume);

        match self.run_phases(run_id, resume).await {
            Ok(report) => {
                let status = if report.interrupted {
                    RunStatus::Interrupted
                } else {
                    RunStatus::Completed
                };
                self.store.finish_run(run_id, status)?;
                tracing::info!(
                    "Harvest run {} {}: {} accepted, {} rejected",
                    run_id,
                    status.to_db_string(),
                    report.pool.accepted,
                    report.pool.rejected
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Harvest run {} failed: {}", run_id, e);
                if let Err(finish_err) = self.store.finish_run(run_id, RunStatus::Failed) {
                    tracing::error!("Failed to record run failure: {}", finish_err);
                }
                Err(e)
            }
        }
    }

    async fn run_phases(&self, run_id: i64, resume: bool) -> Result<HarvestReport, HarvestError> {
        let orphans_released = self.store.release_orphaned_claims()?;
        if orphans_released > 0 {
            tracing::warn!(
                "Released {} claims abandoned by a previous process",
                orphans_released
            );
        }

        let explore = if resume {
            tracing::info!("Resuming: skipping category exploration");
            None
        } else {
            tracing::info!(
                "Phase 1: exploring categories from '{}'",
                self.config.crawler.root_category
            );
            let explorer = CategoryExplorer::new(
                Arc::clone(&self.store),
                Arc::clone(&self.client),
                self.config.api.category_prefixes.clone(),
            );
            Some(
                explorer
                    .explore(&self.config.crawler.root_category, &self.shutdown)
                    .await?,
            )
        };

        if self.shutdown.is_requested() {
            return Ok(HarvestReport {
                run_id,
                orphans_released,
                explore,
                pool: PoolReport::default(),
                interrupted: true,
            });
        }

        tracing::info!("Phase 2: processing pages");
        let processor = PageProcessor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.client),
            Arc::clone(&self.sink),
            self.config.crawler.min_words,
        )
        .with_document_cap(self.config.crawler.document_cap())
        .with_idle_backoff(self.config.crawler.idle_backoff());

        let pool = run_pool(
            Arc::new(processor),
            self.config.crawler.parallel_workers as usize,
            self.shutdown.clone(),
        )
        .await?;

        let interrupted = pool.interrupted();
        Ok(HarvestReport {
            run_id,
            orphans_released,
            explore,
            pool,
            interrupted,
        })
    }
}

/// Runs a harvest with Ctrl-C handling
///
/// This is the main entry point used by the CLI. The first Ctrl-C requests
/// a graceful stop; workers finish the page they hold and exit.
pub async fn run_harvest(
    config: Config,
    config_hash: String,
    resume: bool,
) -> Result<HarvestReport, HarvestError> {
    let coordinator = Coordinator::new(config, config_hash)?;

    let shutdown = coordinator.shutdown_handle();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            shutdown.request();
        }
    });

    let result = coordinator.run(resume).await;
    signal_task.abort();
    result
}
