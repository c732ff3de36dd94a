//! Cooperative cancellation for a download batch.
//!
//! The downloader checks the token before admitting each task and between
//! attempts; in-flight transfers are left to finish or fail on their own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error returned when a batch is stopped by its caller.
#[derive(Debug)]
pub struct BatchCancelled;

impl std::fmt::Display for BatchCancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "download batch cancelled")
    }
}

impl std::error::Error for BatchCancelled {}

/// Shared cancel flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. No new tasks are dispatched afterwards.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(BatchCancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), BatchCancelled> {
        if self.is_cancelled() {
            Err(BatchCancelled)
        } else {
            Ok(())
        }
    }
}
