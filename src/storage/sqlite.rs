//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the StateStore trait.
//! All mutating operations run inside `BEGIN IMMEDIATE` transactions, so the
//! store stays consistent even when several processes or connections share
//! one database file.

use crate::state::PageStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Claim, ClaimedPage, StateStore, StorageError, StorageResult};
use crate::storage::{CrawlStatistics, DocumentRecord, PageRecord, RunRecord, RunStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Maximum number of characters kept from a failure reason
pub const MAX_ERROR_CHARS: usize = 500;

const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(600);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PAGE_COLUMNS: &str = "id, title, status, attempts, last_error, discovered_at, claimed_at, processed_at";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_attempts: u32,
    lease_timeout: Duration,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `max_attempts` - Failed pages with this many attempts are no longer claimed
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path, max_attempts: u32) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn, max_attempts))
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory(max_attempts: u32) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn, max_attempts))
    }

    /// Sets how long a claim may stay in progress before it is swept
    pub fn with_lease_timeout(mut self, lease_timeout: Duration) -> Self {
        self.lease_timeout = lease_timeout;
        self
    }

    fn from_connection(conn: Connection, max_attempts: u32) -> Self {
        Self {
            conn: Mutex::new(conn),
            max_attempts,
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    // Fixed-width UTC form so timestamps compare correctly as text
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

fn truncate_reason(reason: &str) -> String {
    reason.chars().take(MAX_ERROR_CHARS).collect()
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        status: PageStatus::from_db_string(&row.get::<_, String>(2)?)
            .unwrap_or(PageStatus::Failed),
        attempts: row.get(3)?,
        last_error: row.get(4)?,
        discovered_at: row.get(5)?,
        claimed_at: row.get(6)?,
        processed_at: row.get(7)?,
    })
}

/// Maps a failed document insert onto the storage error taxonomy
fn map_insert_error(err: rusqlite::Error, content_hash: &str) -> StorageError {
    if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
        if failure.code == ErrorCode::ConstraintViolation {
            let message = message.clone().unwrap_or_default();
            if message.contains("documents.content_hash") {
                return StorageError::Duplicate {
                    content_hash: content_hash.to_string(),
                };
            }
            return StorageError::ConstraintViolation(message);
        }
    }
    StorageError::Sqlite(err)
}

impl StateStore for SqliteStore {
    // ===== Categories =====

    fn add_category(&self, name: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO categories (name, added_at) VALUES (?1, ?2)",
            params![name, now_timestamp()],
        )?;
        Ok(inserted > 0)
    }

    fn claim_next_category(&self) -> StorageResult<Option<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let next: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, name FROM categories WHERE processed = 0 ORDER BY id ASC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, name)) = next else {
            return Ok(None);
        };

        let updated = tx.execute(
            "UPDATE categories SET processed = 1 WHERE id = ?1 AND processed = 0",
            params![id],
        )?;
        if updated != 1 {
            tx.rollback()?;
            return Err(StorageError::Database(format!(
                "Category '{}' changed while being claimed",
                name
            )));
        }

        tx.commit()?;
        Ok(Some(name))
    }

    // ===== Pages =====

    fn add_page(&self, title: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO pages (title, status, discovered_at) VALUES (?1, ?2, ?3)",
            params![title, PageStatus::Pending.to_db_string(), now_timestamp()],
        )?;
        Ok(inserted > 0)
    }

    fn claim_next_page(&self) -> StorageResult<Claim> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let now = Utc::now();
        let lease = chrono::Duration::milliseconds(self.lease_timeout.as_millis() as i64);
        let swept = tx.execute(
            "UPDATE pages SET status = ?1, last_error = ?2, claimed_at = NULL
             WHERE status = ?3 AND claimed_at IS NOT NULL AND claimed_at < ?4",
            params![
                PageStatus::Failed.to_db_string(),
                "lease expired",
                PageStatus::InProgress.to_db_string(),
                format_timestamp(now - lease),
            ],
        )?;
        if swept > 0 {
            tracing::warn!("Released {} page claims with expired leases", swept);
        }

        let next: Option<(i64, String, String)> = tx
            .query_row(
                "SELECT id, title, status FROM pages
                 WHERE status = ?1 OR (status = ?2 AND attempts < ?3)
                 ORDER BY id ASC LIMIT 1",
                params![
                    PageStatus::Pending.to_db_string(),
                    PageStatus::Failed.to_db_string(),
                    self.max_attempts,
                ],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((id, title, original_status)) = next else {
            // Commit so a lease sweep is not lost
            tx.commit()?;
            return Ok(Claim::Empty);
        };

        let updated = tx.execute(
            "UPDATE pages SET status = ?1, attempts = attempts + 1, claimed_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![
                PageStatus::InProgress.to_db_string(),
                format_timestamp(now),
                id,
                original_status,
            ],
        )?;

        if updated != 1 {
            tx.rollback()?;
            return Ok(Claim::Lost);
        }

        let attempts: u32 =
            tx.query_row("SELECT attempts FROM pages WHERE id = ?1", params![id], |row| {
                row.get(0)
            })?;

        tx.commit()?;
        Ok(Claim::Claimed(ClaimedPage {
            id,
            title,
            attempts,
        }))
    }

    fn record_success(
        &self,
        page: &ClaimedPage,
        url: &str,
        cleaned_text: &str,
        content_hash: &str,
        word_count: u64,
    ) -> StorageResult<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_timestamp();

        let advanced = tx.execute(
            "UPDATE pages SET status = ?1, processed_at = ?2, claimed_at = NULL, last_error = NULL
             WHERE id = ?3 AND status = ?4 AND attempts = ?5",
            params![
                PageStatus::Done.to_db_string(),
                now,
                page.id,
                PageStatus::InProgress.to_db_string(),
                page.attempts,
            ],
        )?;
        if advanced != 1 {
            return Err(StorageError::ClaimLost { page_id: page.id });
        }

        let counter: Option<String> = tx
            .query_row(
                "SELECT value FROM settings WHERE key = 'next_doc_id'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let doc_id: i64 = counter
            .ok_or_else(|| StorageError::Database("next_doc_id counter is missing".to_string()))?
            .parse()
            .map_err(|e| StorageError::Database(format!("Corrupt next_doc_id counter: {}", e)))?;

        tx.execute(
            "INSERT INTO documents
             (doc_id, page_id, title, url, content_hash, word_count, text_content, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                doc_id,
                page.id,
                page.title,
                url,
                content_hash,
                word_count as i64,
                cleaned_text,
                now,
            ],
        )
        .map_err(|e| map_insert_error(e, content_hash))?;

        tx.execute(
            "UPDATE settings SET value = ?1 WHERE key = 'next_doc_id'",
            params![(doc_id + 1).to_string()],
        )?;

        tx.commit()?;
        Ok(doc_id)
    }

    fn record_failure(&self, page: &ClaimedPage, reason: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE pages SET status = ?1, last_error = ?2, processed_at = ?3, claimed_at = NULL
             WHERE id = ?4 AND status = ?5 AND attempts = ?6",
            params![
                PageStatus::Failed.to_db_string(),
                truncate_reason(reason),
                now_timestamp(),
                page.id,
                PageStatus::InProgress.to_db_string(),
                page.attempts,
            ],
        )?;
        if updated != 1 {
            return Err(StorageError::ClaimLost { page_id: page.id });
        }
        Ok(())
    }

    fn is_duplicate_content(&self, content_hash: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM documents WHERE content_hash = ?1 LIMIT 1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn release_orphaned_claims(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let released = conn.execute(
            "UPDATE pages SET status = ?1, last_error = ?2, claimed_at = NULL WHERE status = ?3",
            params![
                PageStatus::Failed.to_db_string(),
                "claim abandoned",
                PageStatus::InProgress.to_db_string(),
            ],
        )?;
        Ok(released as u64)
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
            params![page_id],
            page_from_row,
        )
        .optional()?
        .ok_or_else(|| StorageError::PageNotFound(format!("Page ID {}", page_id)))
    }

    fn get_page_by_title(&self, title: &str) -> StorageResult<Option<PageRecord>> {
        let conn = self.lock()?;
        let page = conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE title = ?1", PAGE_COLUMNS),
                params![title],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    // ===== Documents =====

    fn get_document(&self, doc_id: i64) -> StorageResult<Option<DocumentRecord>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                "SELECT doc_id, page_id, title, url, content_hash, word_count, text_content, fetched_at
                 FROM documents WHERE doc_id = ?1",
                params![doc_id],
                |row| {
                    Ok(DocumentRecord {
                        doc_id: row.get(0)?,
                        page_id: row.get(1)?,
                        title: row.get(2)?,
                        url: row.get(3)?,
                        content_hash: row.get(4)?,
                        word_count: row.get::<_, i64>(5)? as u64,
                        text_content: row.get(6)?,
                        fetched_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(document)
    }

    fn next_doc_id(&self) -> StorageResult<i64> {
        let conn = self.lock()?;
        let value: String = conn.query_row(
            "SELECT value FROM settings WHERE key = 'next_doc_id'",
            [],
            |row| row.get(0),
        )?;
        value
            .parse()
            .map_err(|e| StorageError::Database(format!("Corrupt next_doc_id counter: {}", e)))
    }

    // ===== Runs =====

    fn create_run(&self, config_hash: &str, resumed: bool) -> StorageResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, resumed, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                now_timestamp(),
                config_hash,
                resumed,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now_timestamp(), run_id],
        )?;
        Ok(())
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, resumed, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        resumed: row.get(4)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                            .unwrap_or(RunStatus::Failed),
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    // ===== Statistics =====

    fn count_documents(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM documents")
    }

    fn count_in_progress(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE status = ?1",
            params![PageStatus::InProgress.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn statistics(&self) -> StorageResult<CrawlStatistics> {
        let conn = self.lock()?;

        let mut pages_by_status = HashMap::new();
        let mut total_pages = 0;
        {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM pages GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (status, count) = row?;
                total_pages += count as u64;
                if let Some(status) = PageStatus::from_db_string(&status) {
                    pages_by_status.insert(status, count as u64);
                }
            }
        }

        let documents: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let (categories, categories_processed): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(processed), 0) FROM categories",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(CrawlStatistics {
            total_pages,
            pages_by_status,
            documents: documents as u64,
            categories: categories as u64,
            categories_processed: categories_processed as u64,
        })
    }
}
