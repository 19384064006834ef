use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Category-Harvest
///
/// Every option other than `crawler.root-category` has a default, spelled out
/// by the `default_*` functions below.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Harvest behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Category the exploration starts from (without the category prefix)
    #[serde(rename = "root-category")]
    pub root_category: String,

    /// Stop once this many documents are accepted (0 = unlimited)
    #[serde(rename = "max-documents", default = "default_max_documents")]
    pub max_documents: u64,

    /// Minimum number of words in the cleaned text
    #[serde(rename = "min-words", default = "default_min_words")]
    pub min_words: u64,

    /// Number of concurrent page workers
    #[serde(rename = "parallel-workers", default = "default_parallel_workers")]
    pub parallel_workers: u32,

    /// Failed pages are retried until they reach this many attempts
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Seconds after which an unfinished claim is released
    #[serde(rename = "lease-timeout-secs", default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,

    /// Pause while other workers still hold claims (milliseconds)
    #[serde(rename = "idle-backoff-ms", default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Endpoint of the MediaWiki action API
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Minimum gap between two outgoing requests (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Attempts per request, including the first one
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base wait after a failed attempt (milliseconds, grows linearly)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Base wait after HTTP 429 (milliseconds, grows exponentially)
    #[serde(rename = "rate-limit-backoff-ms", default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prefixes stripped from subcategory titles
    #[serde(rename = "category-prefixes", default = "default_category_prefixes")]
    pub category_prefixes: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// Directory receiving `docNNNNN.html`
    #[serde(rename = "html-directory", default = "default_html_directory")]
    pub html_directory: String,

    /// Directory receiving `docNNNNN.txt`
    #[serde(rename = "text-directory", default = "default_text_directory")]
    pub text_directory: String,

    /// CSV ledger of accepted documents
    #[serde(rename = "metadata-file", default = "default_metadata_file")]
    pub metadata_file: String,

    /// Optional log file, in addition to the console
    #[serde(rename = "log-file", default)]
    pub log_file: Option<String>,
}

impl CrawlerConfig {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// The document cap, if any
    pub fn document_cap(&self) -> Option<u64> {
        (self.max_documents > 0).then_some(self.max_documents)
    }
}

impl ApiConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            request_delay_ms: default_request_delay_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            category_prefixes: default_category_prefixes(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            html_directory: default_html_directory(),
            text_directory: default_text_directory(),
            metadata_file: default_metadata_file(),
            log_file: None,
        }
    }
}

fn default_max_documents() -> u64 {
    35_000
}

fn default_min_words() -> u64 {
    500
}

fn default_parallel_workers() -> u32 {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_lease_timeout_secs() -> u64 {
    600
}

fn default_idle_backoff_ms() -> u64 {
    1000
}

fn default_base_url() -> String {
    "https://ru.wikipedia.org/w/api.php".to_string()
}

fn default_user_agent() -> String {
    "EducationalBot/1.0 (University Project)".to_string()
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_backoff_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_category_prefixes() -> Vec<String> {
    vec!["Category:".to_string(), "Категория:".to_string()]
}

fn default_database_path() -> String {
    "harvest.db".to_string()
}

fn default_html_directory() -> String {
    "html_corpus".to_string()
}

fn default_text_directory() -> String {
    "text_corpus".to_string()
}

fn default_metadata_file() -> String {
    "metadata.csv".to_string()
}
