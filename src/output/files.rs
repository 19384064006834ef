//! File-system document sink
//!
//! Layout:
//! - `<html_dir>/doc00001.html`, first line `<!-- title -->`
//! - `<text_dir>/doc00001.txt`, title, blank line, text
//! - a CSV ledger with one row per accepted document
//!
//! Artifacts are written to a temporary file in the target directory and
//! renamed into place, so a crash never leaves a half-written document.

use crate::config::OutputConfig;
use crate::output::traits::{DocumentSink, SinkError};
use chrono::{SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Header row of the metadata ledger
pub const METADATA_HEADER: &str = "doc_id,title,url,word_count,content_hash,fetched_at";

/// Writes documents to HTML and text directories plus a CSV ledger
#[derive(Debug)]
pub struct FileSink {
    html_dir: PathBuf,
    text_dir: PathBuf,
    metadata_path: PathBuf,
    ledger: Mutex<()>,
}

impl FileSink {
    /// Creates the sink and its directories
    pub fn new(
        html_dir: impl Into<PathBuf>,
        text_dir: impl Into<PathBuf>,
        metadata_path: impl Into<PathBuf>,
    ) -> Result<Self, SinkError> {
        let sink = Self {
            html_dir: html_dir.into(),
            text_dir: text_dir.into(),
            metadata_path: metadata_path.into(),
            ledger: Mutex::new(()),
        };

        fs::create_dir_all(&sink.html_dir)?;
        fs::create_dir_all(&sink.text_dir)?;
        if let Some(parent) = sink.metadata_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(sink)
    }

    /// Creates the sink from the output section of the configuration
    pub fn from_config(config: &OutputConfig) -> Result<Self, SinkError> {
        Self::new(
            &config.html_directory,
            &config.text_directory,
            &config.metadata_file,
        )
    }

    pub fn html_path(&self, doc_id: i64) -> PathBuf {
        self.html_dir.join(format!("doc{:05}.html", doc_id))
    }

    pub fn text_path(&self, doc_id: i64) -> PathBuf {
        self.text_dir.join(format!("doc{:05}.txt", doc_id))
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }
}

impl DocumentSink for FileSink {
    fn write_artifacts(
        &self,
        doc_id: i64,
        title: &str,
        html: &str,
        text: &str,
    ) -> Result<(), SinkError> {
        write_atomic(
            &self.html_dir,
            &self.html_path(doc_id),
            &format!("<!-- {} -->\n{}", title, html),
        )?;
        write_atomic(
            &self.text_dir,
            &self.text_path(doc_id),
            &format!("{}\n\n{}", title, text),
        )?;

        tracing::debug!("Wrote artifacts for document {}", doc_id);
        Ok(())
    }

    fn append_metadata(
        &self,
        doc_id: i64,
        title: &str,
        url: &str,
        word_count: u64,
        content_hash: &str,
    ) -> Result<(), SinkError> {
        let fetched_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let row = format!(
            "{},{},{},{},{},{}\n",
            doc_id,
            csv_field(title),
            csv_field(url),
            word_count,
            content_hash,
            fetched_at
        );

        // A poisoned lock only means another writer panicked mid-append
        let _guard = self.ledger.lock().unwrap_or_else(|e| e.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.metadata_path)?;

        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", METADATA_HEADER)?;
        }
        file.write_all(row.as_bytes())?;
        file.flush()?;

        Ok(())
    }
}

/// Writes `content` to `target` through a temporary file in `dir`
fn write_atomic(dir: &Path, target: &Path, content: &str) -> Result<(), SinkError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target)?;
    Ok(())
}

/// Quotes a CSV field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_sink(dir: &TempDir) -> FileSink {
        FileSink::new(
            dir.path().join("html"),
            dir.path().join("text"),
            dir.path().join("meta").join("metadata.csv"),
        )
        .unwrap()
    }

    #[test]
    fn test_write_artifacts_layout() {
        let dir = TempDir::new().unwrap();
        let sink = create_sink(&dir);

        sink.write_artifacts(7, "Лев Толстой", "<p>body</p>", "line one\nline two")
            .unwrap();

        let html = fs::read_to_string(dir.path().join("html/doc00007.html")).unwrap();
        assert_eq!(html, "<!-- Лев Толстой -->\n<p>body</p>");

        let text = fs::read_to_string(dir.path().join("text/doc00007.txt")).unwrap();
        assert_eq!(text, "Лев Толстой\n\nline one\nline two");
    }

    #[test]
    fn test_rewrite_replaces_artifact() {
        let dir = TempDir::new().unwrap();
        let sink = create_sink(&dir);

        sink.write_artifacts(1, "A", "old", "old").unwrap();
        sink.write_artifacts(1, "A", "new", "new").unwrap();

        let html = fs::read_to_string(sink.html_path(1)).unwrap();
        assert!(html.ends_with("new"));
    }

    #[test]
    fn test_metadata_header_written_once() {
        let dir = TempDir::new().unwrap();
        let sink = create_sink(&dir);

        sink.append_metadata(1, "A", "https://x/wiki/A", 600, "aa").unwrap();
        sink.append_metadata(2, "B, the second", "https://x/wiki/B", 700, "bb")
            .unwrap();

        let content = fs::read_to_string(sink.metadata_path()).unwrap();
        let lines: Vec<_> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], METADATA_HEADER);
        assert!(lines[1].starts_with("1,A,https://x/wiki/A,600,aa,"));
        assert!(lines[2].starts_with("2,\"B, the second\",https://x/wiki/B,700,bb,"));
    }

    #[test]
    fn test_concurrent_appends_keep_rows_intact() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(create_sink(&dir));

        let handles: Vec<_> = (1..=8)
            .map(|id| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    sink.append_metadata(id, "Title", "https://x", 500, "hash")
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read_to_string(sink.metadata_path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines.iter().filter(|l| **l == METADATA_HEADER).count(), 1);
        assert!(lines[1..].iter().all(|l| l.split(',').count() == 6));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
