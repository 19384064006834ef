//! Category graph exploration (phase 1)
//!
//! Breadth-first walk over the category graph starting at the root. The
//! store's unique keys and the processed flag make the walk terminate on
//! cyclic and diamond-shaped graphs: every category is listed at most once
//! and every article is queued at most once.

use crate::api::{strip_category_prefix, RateLimitedClient};
use crate::crawler::Shutdown;
use crate::storage::{StateStore, StorageResult};
use std::sync::Arc;

/// Counters collected during exploration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExploreReport {
    /// Categories whose members were listed (or attempted)
    pub categories_explored: u64,
    /// Newly discovered subcategories
    pub categories_added: u64,
    /// Newly queued article pages
    pub pages_added: u64,
    /// Listings that failed after all retries
    pub listing_failures: u64,
    /// Exploration stopped on a shutdown request
    pub interrupted: bool,
}

/// Discovers categories and article pages
pub struct CategoryExplorer {
    store: Arc<dyn StateStore>,
    client: Arc<RateLimitedClient>,
    category_prefixes: Vec<String>,
}

impl CategoryExplorer {
    pub fn new(
        store: Arc<dyn StateStore>,
        client: Arc<RateLimitedClient>,
        category_prefixes: Vec<String>,
    ) -> Self {
        Self {
            store,
            client,
            category_prefixes,
        }
    }

    /// Explores the graph reachable from `root`
    ///
    /// # Arguments
    ///
    /// * `root` - Root category name without prefix
    /// * `shutdown` - Checked before each category is claimed
    ///
    /// # Returns
    ///
    /// * `Ok(ExploreReport)` - Exploration finished or was interrupted
    /// * `Err(StorageError)` - The store failed; listing failures are not errors
    pub async fn explore(&self, root: &str, shutdown: &Shutdown) -> StorageResult<ExploreReport> {
        let mut report = ExploreReport::default();

        if self.store.add_category(root)? {
            tracing::info!("Seeded root category '{}'", root);
        } else {
            tracing::info!("Root category '{}' already known", root);
        }

        loop {
            if shutdown.is_requested() {
                tracing::info!("Shutdown requested, stopping category exploration");
                report.interrupted = true;
                break;
            }

            let Some(category) = self.store.claim_next_category()? else {
                break;
            };
            report.categories_explored += 1;

            let members = match self.client.list_category_members(&category).await {
                Ok(members) => members,
                Err(e) => {
                    tracing::warn!("Failed to list category '{}': {}", category, e);
                    report.listing_failures += 1;
                    continue;
                }
            };

            let mut new_pages = 0;
            let mut new_categories = 0;

            for member in &members {
                if member.is_article() {
                    if self.store.add_page(&member.title)? {
                        new_pages += 1;
                    }
                } else if member.is_category() {
                    let name = strip_category_prefix(&member.title, &self.category_prefixes);
                    if self.store.add_category(name)? {
                        new_categories += 1;
                    }
                }
            }

            report.pages_added += new_pages;
            report.categories_added += new_categories;

            tracing::info!(
                "Category '{}': {} members, {} new pages, {} new subcategories",
                category,
                members.len(),
                new_pages,
                new_categories
            );
        }

        tracing::info!(
            "Exploration finished: {} categories, {} pages queued, {} listing failures",
            report.categories_explored,
            report.pages_added,
            report.listing_failures
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::storage::SqliteStore;
    use crate::PageStatus;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_client(server: &MockServer) -> Arc<RateLimitedClient> {
        let config = ApiConfig {
            base_url: server.uri(),
            request_delay_ms: 0,
            max_retries: 1,
            retry_delay_ms: 0,
            ..ApiConfig::default()
        };
        Arc::new(RateLimitedClient::new(&config).unwrap())
    }

    async fn mount_listing(server: &MockServer, category: &str, members: serde_json::Value) {
        Mock::given(method("GET"))
            .and(query_param("cmtitle", format!("Category:{}", category).as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"query": {"categorymembers": members}})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_explore_cyclic_graph() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            "Root",
            serde_json::json!([
                {"ns": 0, "title": "A"},
                {"ns": 14, "title": "Category:Sub"},
                {"ns": 6, "title": "File:Ignored.png"}
            ]),
        )
        .await;
        mount_listing(
            &server,
            "Sub",
            serde_json::json!([
                {"ns": 0, "title": "A"},
                {"ns": 0, "title": "B"},
                {"ns": 14, "title": "Категория:Root"}
            ]),
        )
        .await;

        let store = Arc::new(SqliteStore::new_in_memory(3).unwrap());
        let explorer = CategoryExplorer::new(
            store.clone(),
            create_client(&server),
            vec!["Category:".to_string(), "Категория:".to_string()],
        );

        let report = explorer.explore("Root", &Shutdown::new()).await.unwrap();

        assert_eq!(report.categories_explored, 2);
        assert_eq!(report.categories_added, 1);
        assert_eq!(report.pages_added, 2);
        assert_eq!(report.listing_failures, 0);

        let stats = store.statistics().unwrap();
        assert_eq!(stats.categories, 2);
        assert_eq!(stats.categories_processed, 2);
        assert_eq!(stats.pages(PageStatus::Pending), 2);
        assert!(store.get_page_by_title("File:Ignored.png").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_failure_is_counted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = Arc::new(SqliteStore::new_in_memory(3).unwrap());
        let explorer = CategoryExplorer::new(store.clone(), create_client(&server), vec![]);

        let report = explorer.explore("Root", &Shutdown::new()).await.unwrap();

        assert_eq!(report.categories_explored, 1);
        assert_eq!(report.listing_failures, 1);
        assert_eq!(store.statistics().unwrap().categories_processed, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_exploration() {
        let server = MockServer::start().await;
        let store = Arc::new(SqliteStore::new_in_memory(3).unwrap());
        let explorer = CategoryExplorer::new(store.clone(), create_client(&server), vec![]);

        let shutdown = Shutdown::new();
        shutdown.request();
        let report = explorer.explore("Root", &shutdown).await.unwrap();

        assert!(report.interrupted);
        assert_eq!(report.categories_explored, 0);
        assert_eq!(store.statistics().unwrap().categories, 1);
    }
}
