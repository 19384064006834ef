//! Global request pacing
//!
//! One pacer is shared by every caller of the client. The previous dispatch
//! instant lives behind an async mutex and the whole check-sleep-set
//! sequence runs with the lock held, so two requests can never leave closer
//! together than the configured delay.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum gap between consecutive dispatches
#[derive(Debug)]
pub struct RequestPacer {
    delay: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Creates a pacer that spaces dispatches at least `delay` apart
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Waits until a request may be sent and records the dispatch
    pub async fn wait(&self) {
        let mut last = self.last_dispatch.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}
