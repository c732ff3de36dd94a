//! Download tasks and per-task results.

use std::path::PathBuf;

use crate::error::PatchError;

/// One bundle to transfer. Produced by the resolver, consumed once by the downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub bundle_name: String,
    pub hash: String,
    pub target_path: PathBuf,
    pub primary_url: String,
    pub fallback_url: String,
    pub expected_size: u64,
    pub expected_checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Transferred, verified, and registered in the cache index.
    Success,
    /// Retry budget spent (or a non-retryable failure); carries the last cause.
    FailedExhausted(PatchError),
}

/// Reported once per admitted task, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub hash: String,
    pub outcome: TaskOutcome,
    pub bytes_transferred: u64,
    pub attempts: u32,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success)
    }
}

/// Aggregate outcome of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, PatchError)>,
    /// Tasks never admitted because the batch was cancelled.
    pub not_started: Vec<String>,
    pub bytes_transferred: u64,
    pub cancelled: bool,
}

impl BatchSummary {
    /// True when every task in the batch reached `Success`.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.not_started.is_empty()
    }

    pub(super) fn record(&mut self, result: &TaskResult) {
        self.bytes_transferred += result.bytes_transferred;
        match &result.outcome {
            TaskOutcome::Success => self.succeeded.push(result.hash.clone()),
            TaskOutcome::FailedExhausted(e) => self.failed.push((result.hash.clone(), e.clone())),
        }
    }
}
