//! Storage traits and error types
//!
//! This module defines the trait interface for the durable work queue and
//! associated error types.

use crate::storage::{CrawlStatistics, DocumentRecord, PageRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another document already carries this content hash
    #[error("Duplicate content: {content_hash}")]
    Duplicate { content_hash: String },

    /// The page is no longer held in progress by the caller
    #[error("Page {page_id} is not in progress")]
    ClaimLost { page_id: i64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Database file not found: {0}")]
    MissingDatabase(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A page handed to exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedPage {
    pub id: i64,
    pub title: String,
    /// Attempt count including this claim
    pub attempts: u32,
}

/// Outcome of a claim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns the page
    Claimed(ClaimedPage),

    /// The conditional update lost a race; call again
    Lost,

    /// Nothing is claimable right now
    Empty,
}

/// Trait for the durable category/page/document registry
///
/// Every method is atomic with respect to every other method. Implementations
/// are shared between concurrent workers, hence `&self` receivers.
pub trait StateStore: Send + Sync {
    // ===== Categories =====

    /// Inserts a category if it is not known yet
    ///
    /// Returns true iff a new row was created.
    fn add_category(&self, name: &str) -> StorageResult<bool>;

    /// Claims the lowest-id unprocessed category and marks it processed
    fn claim_next_category(&self) -> StorageResult<Option<String>>;

    // ===== Pages =====

    /// Inserts a page if it is not known yet
    ///
    /// Returns true iff a new row was created.
    fn add_page(&self, title: &str) -> StorageResult<bool>;

    /// Claims the lowest-id claimable page
    ///
    /// The status change is a compare-and-set guarded by the status that was
    /// read, so two connections can never both claim the same page.
    fn claim_next_page(&self) -> StorageResult<Claim>;

    /// Stores an accepted document and marks its page done
    ///
    /// Allocates the document id, inserts the document and advances the page
    /// in one transaction. Returns `StorageError::Duplicate` (with nothing
    /// changed) when the content hash already exists, and
    /// `StorageError::ClaimLost` when `page` is no longer the live claim.
    fn record_success(
        &self,
        page: &ClaimedPage,
        url: &str,
        cleaned_text: &str,
        content_hash: &str,
        word_count: u64,
    ) -> StorageResult<i64>;

    /// Marks a claimed page failed with a (truncated) reason
    ///
    /// The claim's attempt count acts as its token: once a lease expires and
    /// the page is claimed again, the old holder gets `ClaimLost`.
    fn record_failure(&self, page: &ClaimedPage, reason: &str) -> StorageResult<()>;

    /// Advisory duplicate check; `record_success` is authoritative
    fn is_duplicate_content(&self, content_hash: &str) -> StorageResult<bool>;

    /// Moves every in-progress page back to failed
    ///
    /// Only safe when no worker of any process is running, i.e. at startup.
    fn release_orphaned_claims(&self) -> StorageResult<u64>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Gets a page by title
    fn get_page_by_title(&self, title: &str) -> StorageResult<Option<PageRecord>>;

    // ===== Documents =====

    /// Gets a document by its document id
    fn get_document(&self, doc_id: i64) -> StorageResult<Option<DocumentRecord>>;

    /// Returns the id the next accepted document will receive
    fn next_doc_id(&self) -> StorageResult<i64>;

    // ===== Runs =====

    /// Records the start of a harvest run
    fn create_run(&self, config_hash: &str, resumed: bool) -> StorageResult<i64>;

    /// Records the end of a harvest run
    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Statistics =====

    /// Counts accepted documents
    fn count_documents(&self) -> StorageResult<u64>;

    /// Counts pages currently claimed by some worker
    fn count_in_progress(&self) -> StorageResult<u64>;

    /// Gathers queue and corpus counters
    fn statistics(&self) -> StorageResult<CrawlStatistics>;
}
