//! Rate-limited MediaWiki client
//!
//! This module handles all HTTP traffic of the harvester, including:
//! - Building the HTTP client with the configured user agent
//! - Global pacing of requests (see [`RequestPacer`])
//! - Retry logic for transient failures and HTTP 429
//! - Paged category listings (`list=categorymembers`)
//! - Page content retrieval (`action=parse` plus a plain-text extract)

use crate::api::pacer::RequestPacer;
use crate::api::text::fallback_article_url;
use crate::api::types::{
    CategoryMember, ExtractResponse, ListResponse, PageContent, ParseResponse,
};
use crate::api::ApiError;
use crate::config::ApiConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Client for the MediaWiki action API
///
/// Every request passes through one shared [`RequestPacer`], so a single
/// instance wrapped in an `Arc` paces all workers together.
#[derive(Debug)]
pub struct RateLimitedClient {
    http: Client,
    base_url: String,
    pacer: RequestPacer,
    max_retries: u32,
    retry_delay: Duration,
    rate_limit_backoff: Duration,
}

impl RateLimitedClient {
    /// Creates a client from the API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client(config)?,
            base_url: config.base_url.clone(),
            pacer: RequestPacer::new(config.request_delay()),
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            rate_limit_backoff: config.rate_limit_backoff(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists every member of a category, following continuation tokens
    ///
    /// # Arguments
    ///
    /// * `category` - Category name without prefix
    ///
    /// # Returns
    ///
    /// All members in listing order, or the error that ended the listing
    pub async fn list_category_members(
        &self,
        category: &str,
    ) -> Result<Vec<CategoryMember>, ApiError> {
        let cmtitle = format!("Category:{}", category);
        let mut members = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut params = vec![
                ("action", "query"),
                ("list", "categorymembers"),
                ("cmtitle", cmtitle.as_str()),
                ("cmlimit", "max"),
                ("format", "json"),
            ];
            if let Some(token) = continuation.as_deref() {
                params.push(("cmcontinue", token));
            }

            let response: ListResponse = self.get_json(&params).await?;

            match response.query {
                Some(query) => members.extend(query.categorymembers),
                None => {
                    tracing::debug!("Listing of '{}' returned no query block", category);
                    break;
                }
            }

            let next = response.continuation.and_then(|c| c.cmcontinue);
            match next {
                Some(token) if continuation.as_deref() == Some(token.as_str()) => {
                    tracing::warn!(
                        "Listing of '{}' repeated continuation token '{}', stopping",
                        category,
                        token
                    );
                    break;
                }
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::debug!("Category '{}' has {} members", category, members.len());
        Ok(members)
    }

    /// Fetches rendered HTML and plain text of a page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(PageContent))` - Both requests returned a page record
    /// * `Ok(None)` - The page does not exist or the API answered with an error object
    /// * `Err(ApiError)` - A request failed after all retries
    pub async fn fetch_page_content(&self, title: &str) -> Result<Option<PageContent>, ApiError> {
        let parsed: ParseResponse = self
            .get_json(&[
                ("action", "parse"),
                ("page", title),
                ("prop", "text"),
                ("format", "json"),
                ("utf8", "1"),
            ])
            .await?;

        let Some(parsed) = parsed.parse else {
            tracing::debug!("No parse result for '{}'", title);
            return Ok(None);
        };

        let extract: ExtractResponse = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts|info"),
                ("inprop", "url"),
                ("explaintext", "1"),
                ("titles", title),
                ("format", "json"),
            ])
            .await?;

        let Some(page) = extract.query.and_then(|q| q.existing_page()) else {
            tracing::debug!("No page record for '{}'", title);
            return Ok(None);
        };

        let url = page
            .fullurl
            .unwrap_or_else(|| fallback_article_url(&self.base_url, title));

        Ok(Some(PageContent {
            title: title.to_string(),
            html: parsed.text.html,
            plain_text: page.extract.unwrap_or_default(),
            url,
            remote_id: page.pageid.unwrap_or(0),
        }))
    }

    /// Sends a paced GET with retries and decodes the JSON body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Wait before next attempt |
    /// |-----------|--------------------------|
    /// | HTTP 429 | `rate_limit_backoff × 2^attempt` |
    /// | Transport error, timeout | `retry_delay × attempt` |
    /// | Other non-2xx status | `retry_delay × attempt` |
    /// | Undecodable body | `retry_delay × attempt` |
    ///
    /// Every outcome consumes one of `max_retries` attempts.
    async fn get_json<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, ApiError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            self.pacer.wait().await;

            let error = match self.send_once(params).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let wait = match error {
                ApiError::RateLimited => self.rate_limit_backoff.saturating_mul(1u32 << attempt.min(16)),
                _ => self.retry_delay.saturating_mul(attempt),
            };

            tracing::warn!(
                "Request failed (attempt {}/{}): {}",
                attempt,
                self.max_retries,
                error
            );
            last_error = error.to_string();

            if attempt < self.max_retries {
                tokio::time::sleep(wait).await;
            }
        }

        Err(ApiError::RetriesExhausted {
            attempts: self.max_retries,
            last_error,
        })
    }

    async fn send_once<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, ApiError> {
        let response = self.http.get(&self.base_url).query(params).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
