//! Remote wiki API access
//!
//! This module contains everything that talks to the MediaWiki action API:
//! - [`RateLimitedClient`] for paced, retried requests
//! - [`RequestPacer`] enforcing the global minimum request gap
//! - Wire types for category listings and page content
//! - Pure text helpers (cleaning, word counting, fingerprinting)

mod client;
mod pacer;
mod text;
mod types;

pub use client::{build_http_client, RateLimitedClient};
pub use pacer::RequestPacer;
pub use text::{clean_text, content_hash, fallback_article_url, strip_category_prefix, word_count};
pub use types::{CategoryMember, PageContent, NAMESPACE_ARTICLE, NAMESPACE_CATEGORY};

use thiserror::Error;

/// Errors raised while talking to the remote API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("rate limited by remote API (HTTP 429)")]
    RateLimited,

    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}
