//! Storage module for persisting harvest state
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - The category queue and the page work queue with its claim protocol
//! - Document insertion with the durable document-id counter
//! - Run tracking for resumption

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteStore, MAX_ERROR_CHARS};
pub use traits::{Claim, ClaimedPage, StateStore, StorageError, StorageResult};

use crate::state::PageStatus;
use std::collections::HashMap;
use std::path::Path;

/// Opens (or creates) a store backed by the SQLite file at `path`
pub fn open_store(path: &Path, max_attempts: u32) -> StorageResult<SqliteStore> {
    SqliteStore::new(path, max_attempts)
}

/// Opens a store only if its database file already exists
///
/// Used by read-only commands, which must not create an empty database.
pub fn open_existing_store(path: &Path, max_attempts: u32) -> StorageResult<SqliteStore> {
    if !path.is_file() {
        return Err(StorageError::MissingDatabase(path.display().to_string()));
    }
    SqliteStore::new(path, max_attempts)
}

/// Represents a page in the database
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub title: String,
    pub status: PageStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub discovered_at: String,
    pub claimed_at: Option<String>,
    pub processed_at: Option<String>,
}

/// Represents an accepted document
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub doc_id: i64,
    pub page_id: i64,
    pub title: String,
    pub url: String,
    pub content_hash: String,
    pub word_count: u64,
    pub text_content: String,
    pub fetched_at: String,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub resumed: bool,
    pub status: RunStatus,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Queue and corpus counters
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Total number of pages discovered
    pub total_pages: u64,

    /// Count of pages by status (statuses with no pages are absent)
    pub pages_by_status: HashMap<PageStatus, u64>,

    /// Number of accepted documents
    pub documents: u64,

    /// Number of categories discovered
    pub categories: u64,

    /// Number of categories already explored
    pub categories_processed: u64,
}

impl CrawlStatistics {
    /// Returns the page count for a status, zero if absent
    pub fn pages(&self, status: PageStatus) -> u64 {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }
}
