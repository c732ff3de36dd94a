//! Progress reporting for a download batch (bytes done, ETA, rate).
//!
//! Consumers can compute rate = bytes_done / elapsed_secs and
//! ETA = (total_bytes - bytes_done) / rate.

/// Snapshot of batch progress, sent after every task completion.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Bytes of bundles that finished successfully.
    pub bytes_done: u64,
    /// Expected bytes of every task in the batch.
    pub total_bytes: u64,
    /// Elapsed time since the batch started (seconds).
    pub elapsed_secs: f64,
    /// Tasks that reached a terminal result (success or exhausted).
    pub tasks_done: usize,
    pub tasks_failed: usize,
    pub task_count: usize,
}

impl ProgressStats {
    /// Download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_bytes.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }
}
