//! Bounded-concurrency bundle downloader.
//!
//! Keeps up to `max_concurrent` transfers in flight; when one finishes the
//! next pending task is admitted immediately. Tasks are admitted in list order
//! and reported in completion order. Each transfer is verified and registered
//! in the cache index before it is reported as a success.

mod curl_transport;
mod progress;
mod task;
mod transport;
mod worker;


pub use curl_transport::CurlTransport;
pub use progress::ProgressStats;
pub use task::{BatchSummary, DownloadTask, TaskOutcome, TaskResult};
pub use transport::{ManifestSource, Transport};

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache_index::CacheIndex;
use crate::config::PatchConfig;
use crate::control::CancelToken;
use crate::integrity::IntegrityVerifier;
use crate::retry::RetryPolicy;

use worker::WorkerContext;

/// Batch-wide knobs.
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub max_concurrent: usize,
    pub policy: RetryPolicy,
    pub task_timeout: Duration,
}

impl DownloadOptions {
    pub fn from_config(cfg: &PatchConfig) -> Self {
        Self {
            max_concurrent: cfg.max_concurrent,
            policy: cfg.retry_policy(),
            task_timeout: cfg.task_timeout(),
        }
    }
}

/// Runs download batches against a transport.
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn Transport>,
    verifier: IntegrityVerifier,
    cache: CacheIndex,
    options: DownloadOptions,
}

/// A running batch: a stream of results plus the final summary.
pub struct DownloadHandle {
    results: mpsc::UnboundedReceiver<TaskResult>,
    join: JoinHandle<Result<BatchSummary>>,
}

impl DownloadHandle {
    /// Next finished task, in completion order. `None` once the batch is done.
    pub async fn next_result(&mut self) -> Option<TaskResult> {
        self.results.recv().await
    }

    /// Wait for every admitted task and return the aggregate summary.
    pub async fn finish(self) -> Result<BatchSummary> {
        let DownloadHandle { results, join } = self;
        drop(results);
        join.await
            .map_err(|e| anyhow::anyhow!("download coordinator join: {}", e))?
    }
}

impl Downloader {
    pub fn new(
        transport: Arc<dyn Transport>,
        verifier: IntegrityVerifier,
        cache: CacheIndex,
        options: DownloadOptions,
    ) -> Self {
        Self {
            transport,
            verifier,
            cache,
            options,
        }
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Start a batch. If `progress_tx` is `Some`, a [`ProgressStats`] snapshot
    /// is offered after each completion (dropped if the channel is full).
    pub fn execute(
        &self,
        tasks: Vec<DownloadTask>,
        cancel: CancelToken,
        progress_tx: Option<mpsc::Sender<ProgressStats>>,
    ) -> DownloadHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            transport: Arc::clone(&self.transport),
            verifier: self.verifier.clone(),
            cache: self.cache.clone(),
            policy: self.options.policy,
            task_timeout: self.options.task_timeout,
            cancel,
        };
        let max_concurrent = self.options.max_concurrent.max(1);
        let join = tokio::spawn(coordinate(ctx, tasks, max_concurrent, tx, progress_tx));
        DownloadHandle { results: rx, join }
    }

    /// Run a batch to completion, ignoring the per-result stream.
    pub async fn run(&self, tasks: Vec<DownloadTask>, cancel: CancelToken) -> Result<BatchSummary> {
        self.execute(tasks, cancel, None).finish().await
    }
}

async fn coordinate(
    ctx: WorkerContext,
    tasks: Vec<DownloadTask>,
    max_concurrent: usize,
    results_tx: mpsc::UnboundedSender<TaskResult>,
    progress_tx: Option<mpsc::Sender<ProgressStats>>,
) -> Result<BatchSummary> {
    let started = Instant::now();
    let task_count = tasks.len();
    let total_bytes: u64 = tasks.iter().map(|t| t.expected_size).sum();
    let mut pending: VecDeque<DownloadTask> = tasks.into();
    let mut summary = BatchSummary::default();
    let mut join_set = tokio::task::JoinSet::new();

    tracing::info!(tasks = task_count, total_bytes, max_concurrent, "download batch started");

    loop {
        while join_set.len() < max_concurrent && !ctx.cancel.is_cancelled() {
            let Some(task) = pending.pop_front() else {
                break;
            };
            join_set.spawn(worker::run_task(ctx.clone(), task));
        }

        if join_set.is_empty() {
            break;
        }

        let Some(res) = join_set.join_next().await else {
            break;
        };
        let result = res.map_err(|e| anyhow::anyhow!("download worker join: {}", e))?;
        summary.record(&result);

        if let Some(tx) = &progress_tx {
            let _ = tx.try_send(ProgressStats {
                bytes_done: summary.bytes_transferred,
                total_bytes,
                elapsed_secs: started.elapsed().as_secs_f64(),
                tasks_done: summary.succeeded.len() + summary.failed.len(),
                tasks_failed: summary.failed.len(),
                task_count,
            });
        }
        // Receiver may be gone when the caller only awaits `finish`.
        let _ = results_tx.send(result);
    }

    if !pending.is_empty() {
        summary.cancelled = true;
        summary.not_started = pending.into_iter().map(|t| t.hash).collect();
        tracing::info!(
            not_started = summary.not_started.len(),
            "download batch cancelled before all tasks were admitted"
        );
    } else if ctx.cancel.is_cancelled() {
        summary.cancelled = true;
    }

    tracing::info!(
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        bytes = summary.bytes_transferred,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "download batch finished"
    );
    Ok(summary)
}
