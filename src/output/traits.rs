use thiserror::Error;

/// Errors raised while writing document artifacts
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to move temporary file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Destination for accepted documents
///
/// Implementations are called only after the document's database
/// transaction has committed, and may be called from several workers at
/// once.
pub trait DocumentSink: Send + Sync {
    /// Writes the HTML and text artifacts of one document
    ///
    /// # Arguments
    ///
    /// * `doc_id` - Document id allocated by the store
    /// * `title` - Page title
    /// * `html` - Rendered HTML body
    /// * `text` - Cleaned plain text
    fn write_artifacts(
        &self,
        doc_id: i64,
        title: &str,
        html: &str,
        text: &str,
    ) -> Result<(), SinkError>;

    /// Appends one row to the metadata ledger
    fn append_metadata(
        &self,
        doc_id: i64,
        title: &str,
        url: &str,
        word_count: u64,
        content_hash: &str,
    ) -> Result<(), SinkError>;
}
