//! Page workers (phase 2)
//!
//! Each worker repeatedly claims a page from the store, fetches it, applies
//! the acceptance rules and records the outcome. Workers stop when:
//! - shutdown was requested
//! - the document cap is reached
//! - nothing is claimable and no other worker holds a claim
//!
//! While other workers still hold claims (whose failure could make pages
//! claimable again) an idle worker backs off and polls again.

use crate::api::{clean_text, content_hash, word_count, RateLimitedClient};
use crate::crawler::Shutdown;
use crate::output::DocumentSink;
use crate::storage::{Claim, ClaimedPage, StateStore, StorageError, StorageResult};
use crate::HarvestError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Why a page was not turned into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The remote API call failed after all retries
    FetchFailed(String),
    /// The API returned no page record
    NotFound,
    /// Cleaned text is below the word minimum
    TooShort { words: u64, minimum: u64 },
    /// A document with the same fingerprint already exists
    Duplicate,
    /// The fingerprint was taken between the check and the insert
    DuplicateRace,
    /// The store could not record the document
    Persistence(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed(e) => write!(f, "fetch failed: {}", e),
            Self::NotFound => write!(f, "fetch failed: page not found"),
            Self::TooShort { words, minimum } => {
                write!(f, "too short: {} words (minimum {})", words, minimum)
            }
            Self::Duplicate => write!(f, "duplicate content"),
            Self::DuplicateRace => write!(f, "duplicate content (race)"),
            Self::Persistence(e) => write!(f, "persistence error: {}", e),
        }
    }
}

/// Result of processing one claimed page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Accepted { doc_id: i64 },
    Rejected(RejectReason),
}

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    CapReached,
    Exhausted,
}

/// One iteration of the worker loop
#[derive(Debug)]
enum Step {
    Processed(PageOutcome),
    Retry,
    Idle,
    Stop(StopReason),
}

/// Per-worker counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub accepted: u64,
    pub rejected: u64,
    pub idle_rounds: u64,
    pub stop_reason: StopReason,
}

/// Aggregate of all worker reports
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    pub accepted: u64,
    pub rejected: u64,
    pub workers: Vec<WorkerReport>,
}

impl PoolReport {
    fn add(&mut self, report: WorkerReport) {
        self.accepted += report.accepted;
        self.rejected += report.rejected;
        self.workers.push(report);
    }

    /// True if at least one worker stopped on a shutdown request
    pub fn interrupted(&self) -> bool {
        self.workers
            .iter()
            .any(|w| w.stop_reason == StopReason::Shutdown)
    }
}

/// Fetches, filters and records claimed pages
///
/// Shared by all workers of a pool.
pub struct PageProcessor {
    store: Arc<dyn StateStore>,
    client: Arc<RateLimitedClient>,
    sink: Arc<dyn DocumentSink>,
    min_words: u64,
    document_cap: Option<u64>,
    idle_backoff: Duration,
}

impl PageProcessor {
    pub fn new(
        store: Arc<dyn StateStore>,
        client: Arc<RateLimitedClient>,
        sink: Arc<dyn DocumentSink>,
        min_words: u64,
    ) -> Self {
        Self {
            store,
            client,
            sink,
            min_words,
            document_cap: None,
            idle_backoff: Duration::from_secs(1),
        }
    }

    /// Stops workers once this many documents exist
    pub fn with_document_cap(mut self, cap: Option<u64>) -> Self {
        self.document_cap = cap;
        self
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    /// Processes one claimed page and records the outcome
    ///
    /// # Returns
    ///
    /// * `Ok(PageOutcome)` - The page left InProgress as Done or Failed
    /// * `Err(StorageError)` - The failure itself could not be recorded
    pub async fn process(&self, page: &ClaimedPage) -> StorageResult<PageOutcome> {
        let content = match self.client.fetch_page_content(&page.title).await {
            Ok(Some(content)) => content,
            Ok(None) => return self.reject(page, RejectReason::NotFound),
            Err(e) => return self.reject(page, RejectReason::FetchFailed(e.to_string())),
        };

        let cleaned = clean_text(&content.plain_text);
        let words = word_count(&cleaned);
        if words < self.min_words {
            return self.reject(
                page,
                RejectReason::TooShort {
                    words,
                    minimum: self.min_words,
                },
            );
        }

        let hash = content_hash(&cleaned);
        match self.store.is_duplicate_content(&hash) {
            Ok(true) => return self.reject(page, RejectReason::Duplicate),
            Ok(false) => {}
            Err(e) => return self.reject(page, RejectReason::Persistence(e.to_string())),
        }

        let doc_id = match self
            .store
            .record_success(page, &content.url, &cleaned, &hash, words)
        {
            Ok(doc_id) => doc_id,
            Err(StorageError::Duplicate { .. }) => {
                return self.reject(page, RejectReason::DuplicateRace)
            }
            Err(StorageError::ClaimLost { page_id }) => {
                tracing::warn!("Lost claim on page {} ('{}') before commit", page_id, page.title);
                return Ok(PageOutcome::Rejected(RejectReason::Persistence(
                    "claim lost".to_string(),
                )));
            }
            Err(e) => return self.reject(page, RejectReason::Persistence(e.to_string())),
        };

        if let Err(e) = self
            .sink
            .write_artifacts(doc_id, &page.title, &content.html, &cleaned)
        {
            tracing::error!("Failed to write artifacts for document {}: {}", doc_id, e);
        }
        if let Err(e) = self
            .sink
            .append_metadata(doc_id, &page.title, &content.url, words, &hash)
        {
            tracing::error!("Failed to append metadata for document {}: {}", doc_id, e);
        }

        tracing::info!(
            "Accepted '{}' as document {} ({} words)",
            page.title,
            doc_id,
            words
        );
        Ok(PageOutcome::Accepted { doc_id })
    }

    fn reject(&self, page: &ClaimedPage, reason: RejectReason) -> StorageResult<PageOutcome> {
        let message = reason.to_string();
        match reason {
            RejectReason::FetchFailed(_) | RejectReason::Persistence(_) => {
                tracing::warn!("Rejected '{}': {}", page.title, message)
            }
            _ => tracing::debug!("Rejected '{}': {}", page.title, message),
        }

        match self.store.record_failure(page, &message) {
            Ok(()) => Ok(PageOutcome::Rejected(reason)),
            Err(StorageError::ClaimLost { page_id }) => {
                tracing::warn!("Page {} was released before its failure was recorded", page_id);
                Ok(PageOutcome::Rejected(reason))
            }
            Err(e) => Err(e),
        }
    }

    async fn step(&self, shutdown: &Shutdown) -> StorageResult<Step> {
        if shutdown.is_requested() {
            return Ok(Step::Stop(StopReason::Shutdown));
        }

        if let Some(cap) = self.document_cap {
            if self.store.count_documents()? >= cap {
                return Ok(Step::Stop(StopReason::CapReached));
            }
        }

        match self.store.claim_next_page()? {
            Claim::Claimed(page) => {
                tracing::debug!("Claimed '{}' (attempt {})", page.title, page.attempts);
                Ok(Step::Processed(self.process(&page).await?))
            }
            Claim::Lost => Ok(Step::Retry),
            Claim::Empty => {
                if self.store.count_in_progress()? == 0 {
                    Ok(Step::Stop(StopReason::Exhausted))
                } else {
                    Ok(Step::Idle)
                }
            }
        }
    }
}

/// Runs one worker until it has nothing left to do
pub async fn run_worker(
    worker_id: usize,
    processor: Arc<PageProcessor>,
    shutdown: Shutdown,
) -> StorageResult<WorkerReport> {
    let mut accepted = 0;
    let mut rejected = 0;
    let mut idle_rounds = 0;

    let stop_reason = loop {
        match processor.step(&shutdown).await? {
            Step::Processed(PageOutcome::Accepted { .. }) => accepted += 1,
            Step::Processed(PageOutcome::Rejected(_)) => rejected += 1,
            Step::Retry => tokio::task::yield_now().await,
            Step::Idle => {
                idle_rounds += 1;
                tokio::time::sleep(processor.idle_backoff).await;
            }
            Step::Stop(reason) => break reason,
        }
    };

    tracing::info!(
        "Worker {} stopped ({:?}): {} accepted, {} rejected",
        worker_id,
        stop_reason,
        accepted,
        rejected
    );

    Ok(WorkerReport {
        worker_id,
        accepted,
        rejected,
        idle_rounds,
        stop_reason,
    })
}

/// Runs `workers` concurrent workers and aggregates their reports
///
/// # Returns
///
/// * `Ok(PoolReport)` - Every worker stopped normally
/// * `Err(HarvestError)` - A worker hit a storage error or panicked
pub async fn run_pool(
    processor: Arc<PageProcessor>,
    workers: usize,
    shutdown: Shutdown,
) -> Result<PoolReport, HarvestError> {
    tracing::info!("Starting {} workers", workers);

    let mut tasks = JoinSet::new();
    for worker_id in 0..workers {
        tasks.spawn(run_worker(
            worker_id,
            Arc::clone(&processor),
            shutdown.clone(),
        ));
    }

    let mut report = PoolReport::default();
    let mut first_error: Option<HarvestError> = None;

    // Joined in completion order so one failure stops the rest promptly
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(worker)) => report.add(worker),
            Ok(Err(e)) => {
                tracing::error!("Worker failed: {}", e);
                shutdown.request();
                if first_error.is_none() {
                    first_error = Some(e.into());
                }
            }
            Err(e) => {
                tracing::error!("Worker task panicked: {}", e);
                shutdown.request();
                if first_error.is_none() {
                    first_error = Some(HarvestError::Worker(e.to_string()));
                }
            }
        }
    }
    report.workers.sort_by_key(|w| w.worker_id);

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}
