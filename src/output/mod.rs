//! Output module for accepted documents and reports
//!
//! This module handles:
//! - Writing document artifacts (HTML, text) and the metadata ledger
//! - Rendering harvest statistics

mod files;
pub mod stats;
mod traits;

pub use files::{FileSink, METADATA_HEADER};
pub use stats::{format_statistics, load_statistics, print_statistics};
pub use traits::{DocumentSink, SinkError};
