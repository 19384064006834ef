//! Crawler module for category exploration and page processing
//!
//! This module contains the core harvesting logic, including:
//! - Category graph exploration (phase 1)
//! - The page worker pool with its claim loop (phase 2)
//! - Overall harvest coordination and graceful shutdown

mod coordinator;
mod explorer;
mod worker;

pub use coordinator::{run_harvest, Coordinator, HarvestReport};
pub use explorer::{CategoryExplorer, ExploreReport};
pub use worker::{
    run_pool, run_worker, PageOutcome, PageProcessor, PoolReport, RejectReason, StopReason,
    WorkerReport,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag asking every phase to stop at its next checkpoint
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
