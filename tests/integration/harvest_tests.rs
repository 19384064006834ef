//! End-to-end harvests against a mock MediaWiki API
//!
//! These tests use wiremock to serve category listings and page content,
//! then run the coordinator over a real SQLite file and output directories.

use category_harvest::config::{parse_config, Config};
use category_harvest::crawler::Coordinator;
use category_harvest::output::METADATA_HEADER;
use category_harvest::storage::{open_store, RunStatus, StateStore};
use category_harvest::PageStatus;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server and a temp directory
fn create_test_config(server: &MockServer, dir: &TempDir, workers: u32) -> Config {
    let root = dir.path().display().to_string().replace('\\', "/");
    parse_config(&format!(
        r#"
[crawler]
root-category = "A"
min-words = 500
parallel-workers = {workers}
idle-backoff-ms = 10

[api]
base-url = "{base}/w/api.php"
request-delay-ms = 0
retry-delay-ms = 0
max-retries = 1

[output]
database-path = "{root}/harvest.db"
html-directory = "{root}/html"
text-directory = "{root}/text"
metadata-file = "{root}/metadata.csv"
"#,
        workers = workers,
        base = server.uri(),
        root = root,
    ))
    .expect("Invalid test configuration")
}

fn words(count: usize, seed: &str) -> String {
    (0..count)
        .map(|i| format!("{}{}", seed, i))
        .collect::<Vec<_>>()
        .join(" ")
}

async fn mount_category(server: &MockServer, name: &str, members: serde_json::Value) {
    Mock::given(method("GET"))
        .and(query_param("list", "categorymembers"))
        .and(query_param("cmtitle", format!("Category:{}", name).as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"query": {"categorymembers": members}})),
        )
        .mount(server)
        .await;
}

async fn mount_article(server: &MockServer, title: &str, page_id: i64, text: &str) {
    Mock::given(method("GET"))
        .and(query_param("action", "parse"))
        .and(query_param("page", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "parse": {"title": title, "pageid": page_id, "text": {"*": format!("<p>{}</p>", title)}}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("prop", "extracts|info"))
        .and(query_param("titles", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "query": {"pages": {page_id.to_string(): {
                "pageid": page_id,
                "ns": 0,
                "title": title,
                "extract": format!("== {} ==\n{}\n[[Категория:Test]]", title, text),
                "fullurl": format!("https://wiki.example/wiki/{}", title)
            }}}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_two_level_category() {
    let server = MockServer::start().await;
    mount_category(
        &server,
        "A",
        serde_json::json!([
            {"ns": 0, "title": "X"},
            {"ns": 14, "title": "Category:B"}
        ]),
    )
    .await;
    mount_category(&server, "B", serde_json::json!([{"ns": 0, "title": "Y"}])).await;
    mount_article(&server, "X", 1, &words(200, "x")).await;
    mount_article(&server, "Y", 2, &words(800, "y")).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 2);
    let db_path = dir.path().join("harvest.db");

    let coordinator = Coordinator::new(config, "test-hash".to_string()).unwrap();
    let report = coordinator.run(false).await.unwrap();

    assert!(!report.interrupted);
    assert_eq!(report.pool.accepted, 1);
    let explore = report.explore.expect("exploration should have run");
    assert_eq!(explore.categories_explored, 2);
    assert_eq!(explore.pages_added, 2);

    let store = open_store(&db_path, 3).unwrap();
    let stats = store.statistics().unwrap();
    assert_eq!(stats.categories, 2);
    assert_eq!(stats.categories_processed, 2);
    assert_eq!(stats.total_pages, 2);

    let x = store.get_page_by_title("X").unwrap().unwrap();
    assert_eq!(x.status, PageStatus::Failed);
    assert!(x.attempts >= 1);
    assert!(x
        .last_error
        .as_deref()
        .unwrap()
        .starts_with("too short: 200 words"));

    let y = store.get_page_by_title("Y").unwrap().unwrap();
    assert_eq!(y.status, PageStatus::Done);

    assert_eq!(store.count_documents().unwrap(), 1);
    assert_eq!(store.next_doc_id().unwrap(), 2);
    let document = store.get_document(1).unwrap().unwrap();
    assert_eq!(document.title, "Y");
    assert_eq!(document.page_id, y.id);
    assert_eq!(document.word_count, 800);
    assert_eq!(document.url, "https://wiki.example/wiki/Y");
    assert!(!document.text_content.contains("=="));

    let html = fs::read_to_string(dir.path().join("html/doc00001.html")).unwrap();
    assert!(html.starts_with("<!-- Y -->\n"));
    let text = fs::read_to_string(dir.path().join("text/doc00001.txt")).unwrap();
    assert!(text.starts_with("Y\n\ny0 y1"));
    let metadata = fs::read_to_string(dir.path().join("metadata.csv")).unwrap();
    let rows: Vec<_> = metadata.lines().collect();
    assert_eq!(rows[0], METADATA_HEADER);
    assert_eq!(rows.len(), 2);
    assert!(rows[1].starts_with("1,Y,https://wiki.example/wiki/Y,800,"));

    let run = store.latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert!(!run.resumed);
}

#[tokio::test]
async fn test_eight_workers_one_page() {
    let server = MockServer::start().await;
    mount_category(&server, "A", serde_json::json!([{"ns": 0, "title": "Solo"}])).await;
    mount_article(&server, "Solo", 7, &words(600, "s")).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 8);
    let db_path = dir.path().join("harvest.db");

    let coordinator = Coordinator::new(config, "hash".to_string()).unwrap();
    let report = coordinator.run(false).await.unwrap();

    assert_eq!(report.pool.workers.len(), 8);
    assert_eq!(report.pool.accepted, 1);
    assert_eq!(report.pool.rejected, 0);

    let store = open_store(&db_path, 3).unwrap();
    assert_eq!(store.count_documents().unwrap(), 1);
    assert_eq!(store.next_doc_id().unwrap(), 2);
    assert_eq!(
        store.get_page_by_title("Solo").unwrap().unwrap().attempts,
        1
    );
}

#[tokio::test]
async fn test_resume_skips_exploration_and_keeps_done_pages() {
    let server = MockServer::start().await;
    mount_category(&server, "A", serde_json::json!([{"ns": 0, "title": "Kept"}])).await;
    mount_article(&server, "Kept", 1, &words(600, "k")).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    let first = Coordinator::new(create_test_config(&server, &dir, 2), "h1".to_string()).unwrap();
    first.run(false).await.unwrap();
    drop(first);

    // Queue a page directly, as if exploration had found it before a crash
    {
        let store = open_store(&db_path, 3).unwrap();
        store.add_page("Late").unwrap();
    }
    mount_article(&server, "Late", 2, &words(700, "l")).await;

    let second = Coordinator::new(create_test_config(&server, &dir, 2), "h2".to_string()).unwrap();
    let report = second.run(true).await.unwrap();

    assert!(report.explore.is_none());
    assert_eq!(report.pool.accepted, 1);

    let store = open_store(&db_path, 3).unwrap();
    assert_eq!(store.count_documents().unwrap(), 2);
    assert_eq!(
        store.get_page_by_title("Kept").unwrap().unwrap().status,
        PageStatus::Done
    );
    assert_eq!(store.get_document(2).unwrap().unwrap().title, "Late");

    let run = store.latest_run().unwrap().unwrap();
    assert!(run.resumed);
    assert_eq!(run.config_hash, "h2");

    // Exploration ran once, in the first session only
    let listings = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.query().unwrap_or("").contains("categorymembers"))
        .count();
    assert_eq!(listings, 1);
}

#[tokio::test]
async fn test_document_cap_stops_harvest() {
    let server = MockServer::start().await;
    mount_category(
        &server,
        "A",
        serde_json::json!([
            {"ns": 0, "title": "P1"},
            {"ns": 0, "title": "P2"},
            {"ns": 0, "title": "P3"}
        ]),
    )
    .await;
    for (i, title) in ["P1", "P2", "P3"].iter().enumerate() {
        mount_article(&server, title, i as i64 + 1, &words(600, title)).await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &dir, 1);
    config.crawler.max_documents = 2;

    let coordinator = Coordinator::new(config, "hash".to_string()).unwrap();
    let report = coordinator.run(false).await.unwrap();

    assert_eq!(report.pool.accepted, 2);
    let store = open_store(&dir.path().join("harvest.db"), 3).unwrap();
    assert_eq!(store.count_documents().unwrap(), 2);
    assert_eq!(
        store.get_page_by_title("P3").unwrap().unwrap().status,
        PageStatus::Pending
    );
}
