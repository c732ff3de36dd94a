//! One task's attempt loop: transfer, verify, register.

use std::sync::Arc;
use std::time::Duration;

use crate::cache_index::CacheIndex;
use crate::control::{BatchCancelled, CancelToken};
use crate::error::PatchError;
use crate::integrity::IntegrityVerifier;
use crate::retry::{classify, Host, RetryDecision, RetryPolicy, TransferError};

use super::task::{DownloadTask, TaskOutcome, TaskResult};
use super::transport::Transport;

/// Everything a worker needs, shared across the batch.
#[derive(Clone)]
pub(super) struct WorkerContext {
    pub transport: Arc<dyn Transport>,
    pub verifier: IntegrityVerifier,
    pub cache: CacheIndex,
    pub policy: RetryPolicy,
    pub task_timeout: Duration,
    pub cancel: CancelToken,
}

/// Runs attempts until success or the policy gives up.
///
/// Attempt `n` targets the primary URL when `n` is odd and the fallback URL
/// when `n` is even, so two attempts touch both hosts.
pub(super) async fn run_task(ctx: WorkerContext, task: DownloadTask) -> TaskResult {
    let mut attempt = 1u32;
    loop {
        let url = match RetryPolicy::host_for(attempt) {
            Host::Primary => &task.primary_url,
            Host::Fallback => &task.fallback_url,
        };

        let err = match attempt_once(&ctx, &task, url).await {
            Ok(bytes) => {
                return match ctx.cache.insert(&task.hash).await {
                    Ok(_) => {
                        tracing::debug!(hash = %task.hash, bytes, attempt, "bundle downloaded");
                        TaskResult {
                            hash: task.hash,
                            outcome: TaskOutcome::Success,
                            bytes_transferred: bytes,
                            attempts: attempt,
                        }
                    }
                    Err(e) => TaskResult {
                        hash: task.hash,
                        outcome: TaskOutcome::FailedExhausted(e),
                        bytes_transferred: bytes,
                        attempts: attempt,
                    },
                };
            }
            Err(e) => e,
        };

        let kind = classify(&err);
        if kind.is_integrity() {
            tracing::warn!(
                hash = %task.hash,
                url = %url,
                attempt,
                "downloaded bundle failed verification (possible server-side corruption): {}",
                err
            );
        } else {
            tracing::warn!(hash = %task.hash, url = %url, attempt, "transfer failed: {}", err);
        }

        let decision = match ctx.cancel.check() {
            Ok(()) => ctx.policy.decide(attempt, kind),
            Err(BatchCancelled) => RetryDecision::NoRetry,
        };
        match decision {
            RetryDecision::RetryAfter(delay) => {
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::NoRetry => {
                tracing::error!(hash = %task.hash, attempts = attempt, "giving up on bundle: {}", err);
                let reason = if ctx.cancel.is_cancelled() {
                    format!("{} ({})", err, BatchCancelled)
                } else {
                    err.to_string()
                };
                let error = if kind.is_integrity() {
                    PatchError::IntegrityMismatch {
                        hash: task.hash.clone(),
                        reason,
                    }
                } else {
                    PatchError::NetworkFailure {
                        resource: task.hash.clone(),
                        reason,
                    }
                };
                return TaskResult {
                    hash: task.hash,
                    outcome: TaskOutcome::FailedExhausted(error),
                    bytes_transferred: 0,
                    attempts: attempt,
                };
            }
        }
    }
}

/// One transfer plus verification of the written file.
async fn attempt_once(
    ctx: &WorkerContext,
    task: &DownloadTask,
    url: &str,
) -> Result<u64, TransferError> {
    let transport = Arc::clone(&ctx.transport);
    let url = url.to_string();
    let dest = task.target_path.clone();
    let timeout = ctx.task_timeout;
    let mut transfer = tokio::task::spawn_blocking(move || transport.fetch(&url, &dest, timeout));

    // A timed-out transfer still owns the `.part` file and a concurrency slot,
    // so it must return before the next attempt or the task result.
    let joined = match tokio::time::timeout(timeout, &mut transfer).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::debug!(hash = %task.hash, "attempt timed out; waiting for transfer to stop");
            let _ = transfer.await;
            return Err(TransferError::TimedOut(timeout));
        }
    };
    let bytes = match joined {
        Err(join) => {
            return Err(TransferError::Transport(format!("transfer task join: {}", join)))
        }
        Ok(res) => res?,
    };

    let verifier = ctx.verifier.clone();
    let path = task.target_path.clone();
    let size = task.expected_size;
    let checksum = task.expected_checksum.clone();
    tokio::task::spawn_blocking(move || verifier.check(&path, size, &checksum))
        .await
        .map_err(|e| TransferError::Transport(format!("verify task join: {}", e)))?
        .map_err(TransferError::Integrity)?;

    Ok(bytes)
}
