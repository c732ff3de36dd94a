//! `bpatch update` – fetch the remote manifest and download missing bundles.

use anyhow::{bail, Result};
use bpatch_core::config::PatchConfig;
use bpatch_core::control::CancelToken;
use bpatch_core::downloader::{CurlTransport, ProgressStats};
use bpatch_core::resolver::Request;
use bpatch_core::session::{load_builtin_manifest, PatchReport, PatchSession};
use std::sync::Arc;
use std::time::Instant;

use super::layout;

#[derive(Debug, Clone, Default)]
pub struct UpdateArgs {
    pub resource_version: u32,
    pub tags: Vec<String>,
    pub assets: Vec<String>,
    pub bundles: Vec<String>,
    pub app_version: String,
}

/// Request from the command line. Explicit assets, then bundles, then tags,
/// then the configured DLC tags. `None` means every bundle in the manifest.
pub fn build_request(args: &UpdateArgs, dlc_tags: &[String]) -> Option<Request> {
    if !args.assets.is_empty() {
        Some(Request::Assets(args.assets.clone()))
    } else if !args.bundles.is_empty() {
        Some(Request::Bundles(args.bundles.clone()))
    } else if !args.tags.is_empty() {
        Some(Request::Tags(args.tags.clone()))
    } else if !dlc_tags.is_empty() {
        Some(Request::Tags(dlc_tags.to_vec()))
    } else {
        None
    }
}

pub async fn run_update(cfg: &PatchConfig, args: UpdateArgs) -> Result<()> {
    let layout = layout(cfg)?;
    let builtin = load_builtin_manifest(&layout, &cfg.manifest_file_name)?;
    let transport = Arc::new(CurlTransport::new());
    let mut session = PatchSession::open_in(
        layout,
        cfg.clone(),
        &args.app_version,
        builtin,
        transport.clone(),
        transport,
    )
    .await?;

    session.initialize(args.resource_version).await?;

    let request = match build_request(&args, &cfg.dlc_tags) {
        Some(r) => r,
        None => {
            let target = session
                .remote_manifest()
                .unwrap_or_else(|| session.local_manifest());
            Request::Bundles(target.bundles().iter().map(|b| b.name().to_string()).collect())
        }
    };

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<ProgressStats>(16);
    const PROGRESS_INTERVAL_MS: u64 = 500;
    let progress_handle = tokio::spawn(async move {
        let mut last_print = Instant::now();
        let mut printed = false;
        while let Some(stats) = progress_rx.recv().await {
            let now = Instant::now();
            if now.duration_since(last_print).as_millis() as u64 >= PROGRESS_INTERVAL_MS
                || stats.tasks_done == stats.task_count
            {
                let done_mib = stats.bytes_done as f64 / 1_048_576.0;
                let total_mib = stats.total_bytes as f64 / 1_048_576.0;
                let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
                let eta = stats
                    .eta_secs()
                    .map(|s| format!("{:.0}s", s))
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "  {}/{} bundles  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}",
                    stats.tasks_done,
                    stats.task_count,
                    done_mib,
                    total_mib,
                    stats.fraction() * 100.0,
                    rate_mib,
                    eta
                );
                last_print = now;
                printed = true;
            }
        }
        if printed {
            println!();
        }
    });

    let result = session
        .download_with_progress(request, CancelToken::new(), Some(progress_tx))
        .await;
    let _ = progress_handle.await;
    let report = result?;
    print_report(&report);
    session.shutdown().await;

    if !report.is_complete() {
        bail!(
            "{} bundle(s) failed; local manifest left at the previous version",
            report.failed.len() + report.not_started.len()
        );
    }
    Ok(())
}

fn print_report(report: &PatchReport) {
    println!("Resource version:  {}", report.resource_version);
    println!("Downloaded:        {}", report.downloaded);
    println!("Skipped (builtin): {}", report.skipped_builtin);
    println!("Skipped (cached):  {}", report.skipped_cached);
    if report.shared_hash > 0 {
        println!("Shared hash:       {}", report.shared_hash);
    }
    println!("Transferred:       {} bytes", report.bytes_transferred);
    if !report.failed.is_empty() {
        println!("Failed:            {}", report.failed.len());
        for (hash, err) in &report.failed {
            println!("  {}  {}", hash, err);
        }
    }
    if !report.unresolved.is_empty() {
        println!("Unresolved:");
        for path in &report.unresolved {
            println!("  {}", path);
        }
    }
    if report.promoted {
        println!("Local manifest promoted.");
    }
}
