//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Shared stop flag and running indicator for one controller
///
/// Cloning is cheap; every clone observes the same flags. Stopping never
/// interrupts an await in progress: the controller notices the flag at its
/// next checkpoint.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop_requested: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the controller to stop at its next checkpoint
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn clear(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    /// Sleep for `total`, checking the stop flag every `poll`
    ///
    /// Returns `false` as soon as a stop is seen, `true` once the full
    /// duration has elapsed.
    pub async fn wait(&self, total: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if self.is_stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }
}
