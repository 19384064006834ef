//! Statistics reporting
//!
//! This module loads counters from the store and renders them for the
//! end-of-run report and the `--stats` command.

use crate::state::PageStatus;
use crate::storage::{CrawlStatistics, RunRecord, StateStore, StorageResult};

/// Loads statistics and the latest run from the store
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok((CrawlStatistics, Option<RunRecord>))` - Counters and the most recent run, if any
/// * `Err(StorageError)` - Failed to query the store
pub fn load_statistics(
    store: &dyn StateStore,
) -> StorageResult<(CrawlStatistics, Option<RunRecord>)> {
    let stats = store.statistics()?;
    let run = store.latest_run()?;
    Ok((stats, run))
}

/// Renders statistics as a human-readable report
pub fn format_statistics(stats: &CrawlStatistics, run: Option<&RunRecord>) -> String {
    let mut out = String::from("=== Harvest Statistics ===\n\n");

    out.push_str("Categories:\n");
    out.push_str(&format!("  Discovered: {}\n", stats.categories));
    out.push_str(&format!("  Explored: {}\n\n", stats.categories_processed));

    out.push_str("Pages by Status:\n");
    for status in PageStatus::all() {
        let count = stats.pages(status);
        let percentage = if stats.total_pages > 0 {
            (count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        out.push_str(&format!("  {}: {} ({:.1}%)\n", status, count, percentage));
    }
    out.push_str(&format!("  Total: {}\n\n", stats.total_pages));

    out.push_str(&format!("Documents accepted: {}\n", stats.documents));

    if let Some(run) = run {
        out.push_str(&format!(
            "\nLatest run: #{} ({}{})\n",
            run.id,
            run.status.to_db_string(),
            if run.resumed { ", resumed" } else { "" }
        ));
        out.push_str(&format!("  Started: {}\n", run.started_at));
        if let Some(finished) = &run.finished_at {
            out.push_str(&format!("  Finished: {}\n", finished));
        }
        out.push_str(&format!("  Config hash: {}\n", run.config_hash));
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &CrawlStatistics, run: Option<&RunRecord>) {
    print!("{}", format_statistics(stats, run));
}
