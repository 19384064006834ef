//! Store behavior across threads and process restarts
//!
//! Each thread opens its own `SqliteStore` on a shared temporary database
//! file, the same way separate processes would.

use category_harvest::storage::{Claim, SqliteStore, StateStore, StorageError};
use category_harvest::{content_hash, PageStatus};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("harvest.db")
}

fn open(path: &Path) -> SqliteStore {
    SqliteStore::new(path, 3).expect("Failed to open store")
}

#[test]
fn test_concurrent_claims_on_one_page() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    open(&path).add_page("Only").unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = open(&path);
                barrier.wait();
                loop {
                    match store.claim_next_page().unwrap() {
                        Claim::Lost => continue,
                        other => return other,
                    }
                }
            })
        })
        .collect();

    let claims: Vec<Claim> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = claims
        .iter()
        .filter_map(|c| match c {
            Claim::Claimed(page) => Some(page.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].title, "Only");
    assert_eq!(winners[0].attempts, 1);
    assert_eq!(
        claims.iter().filter(|c| **c == Claim::Empty).count(),
        7
    );

    let page = open(&path).get_page_by_title("Only").unwrap().unwrap();
    assert_eq!(page.status, PageStatus::InProgress);
    assert_eq!(page.attempts, 1);
}

#[test]
fn test_concurrent_record_success_allocates_unique_ids() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    {
        let store = open(&path);
        for i in 0..40 {
            store.add_page(&format!("Page {}", i)).unwrap();
        }
    }

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                let store = open(&path);
                let mut ids = Vec::new();
                loop {
                    let page = match store.claim_next_page().unwrap() {
                        Claim::Claimed(page) => page,
                        Claim::Lost => continue,
                        Claim::Empty => break,
                    };
                    let text = format!("text of {} by {}", page.title, worker);
                    let doc_id = store
                        .record_success(
                            &page,
                            "https://example.org",
                            &text,
                            &content_hash(&text),
                            4,
                        )
                        .unwrap();
                    ids.push(doc_id);
                }
                ids
            })
        })
        .collect();

    let mut all_ids = Vec::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        // Each worker sees its own ids in increasing order
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all_ids.extend(ids);
    }

    all_ids.sort_unstable();
    assert_eq!(all_ids, (1..=40).collect::<Vec<i64>>());

    let store = open(&path);
    assert_eq!(store.next_doc_id().unwrap(), 41);
    assert_eq!(store.count_documents().unwrap(), 40);
}

#[test]
fn test_duplicate_leaves_counter_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = open(&db_path(&dir));
    store.add_page("A").unwrap();
    store.add_page("B").unwrap();

    let hash = content_hash("same body");
    let Claim::Claimed(a) = store.claim_next_page().unwrap() else {
        panic!("expected claim");
    };
    store
        .record_success(&a, "u", "same body", &hash, 2)
        .unwrap();

    let Claim::Claimed(b) = store.claim_next_page().unwrap() else {
        panic!("expected claim");
    };
    let before = store.next_doc_id().unwrap();
    let result = store.record_success(&b, "u", "same body", &hash, 2);

    assert!(matches!(result, Err(StorageError::Duplicate { .. })));
    assert_eq!(store.next_doc_id().unwrap(), before);
    assert_eq!(
        store.get_page(b.id).unwrap().status,
        PageStatus::InProgress
    );
}

#[test]
fn test_restart_keeps_done_and_reclaims_the_rest() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    {
        let store = open(&path);
        for title in ["Done", "Flaky", "Pending"] {
            store.add_page(title).unwrap();
        }

        let Claim::Claimed(done) = store.claim_next_page().unwrap() else {
            panic!("expected claim");
        };
        store
            .record_success(&done, "u", "body", &content_hash("body"), 1)
            .unwrap();

        let Claim::Claimed(flaky) = store.claim_next_page().unwrap() else {
            panic!("expected claim");
        };
        store.record_failure(&flaky, "fetch failed: boom").unwrap();

        // Failed pages come back first; this claim is never finished,
        // as if the process died while holding it
        let Claim::Claimed(crashed) = store.claim_next_page().unwrap() else {
            panic!("expected claim");
        };
        assert_eq!(crashed.title, "Flaky");
        assert_eq!(crashed.attempts, 2);
    }

    let store = open(&path);
    assert_eq!(store.release_orphaned_claims().unwrap(), 1);
    let flaky = store.get_page_by_title("Flaky").unwrap().unwrap();
    assert_eq!(flaky.status, PageStatus::Failed);
    assert_eq!(flaky.last_error.as_deref(), Some("claim abandoned"));

    let mut reclaimed = HashSet::new();
    loop {
        match store.claim_next_page().unwrap() {
            Claim::Claimed(page) => {
                reclaimed.insert(page.title.clone());
                store.record_failure(&page, "again").unwrap();
            }
            Claim::Lost => continue,
            Claim::Empty => break,
        }
    }

    assert!(!reclaimed.contains("Done"));
    assert!(reclaimed.contains("Flaky"));
    assert!(reclaimed.contains("Pending"));

    assert_eq!(
        store.get_page_by_title("Done").unwrap().unwrap().status,
        PageStatus::Done
    );
    for title in ["Flaky", "Pending"] {
        let page = store.get_page_by_title(title).unwrap().unwrap();
        assert_eq!(page.status, PageStatus::Failed);
        assert_eq!(page.attempts, 3);
    }
    assert_eq!(store.count_documents().unwrap(), 1);
}
