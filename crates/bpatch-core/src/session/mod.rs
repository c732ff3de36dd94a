//! Patch session: owns the three manifests, the cache index, and the
//! downloader for one update cycle.
//!
//! ```text
//! Uninitialized -> FetchingRemoteManifest -> ManifestReady
//!     -> ResolvingDownloads -> Downloading -> Reconciled
//! ```
//! Any fatal error moves the session to `Failed`. The remote manifest
//! replaces the local one only when every task of a batch succeeded.

mod patch_cache;
mod services;


pub use patch_cache::{reconcile_app_version, PatchCacheMeta};
pub use services::{BundleInfo, BundleServices, HostBundleServices, OfflineBundleServices};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache_index::CacheIndex;
use crate::config::{PatchConfig, PlayMode};
use crate::control::CancelToken;
use crate::downloader::{DownloadOptions, Downloader, ManifestSource, ProgressStats, Transport};
use crate::endpoints::RemoteEndpoints;
use crate::error::PatchError;
use crate::integrity::IntegrityVerifier;
use crate::manifest::{self, Manifest};
use crate::resolver::{BundleResolver, Request};
use crate::storage::SandboxLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    FetchingRemoteManifest,
    ManifestReady,
    ResolvingDownloads,
    Downloading,
    Reconciled,
    Failed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::FetchingRemoteManifest => "fetching-remote-manifest",
            SessionState::ManifestReady => "manifest-ready",
            SessionState::ResolvingDownloads => "resolving-downloads",
            SessionState::Downloading => "downloading",
            SessionState::Reconciled => "reconciled",
            SessionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregate result of one `download` call.
#[derive(Debug, Clone, Default)]
pub struct PatchReport {
    pub resource_version: u32,
    pub skipped_builtin: usize,
    /// Cache hits, including files verified and registered during resolution.
    pub skipped_cached: usize,
    pub downloaded: usize,
    /// Bundles whose bytes come from another bundle's task with the same hash.
    pub shared_hash: usize,
    pub failed: Vec<(String, PatchError)>,
    pub not_started: Vec<String>,
    pub unresolved: Vec<String>,
    pub bytes_transferred: u64,
    pub cancelled: bool,
    /// True when the target manifest is now the local manifest.
    pub promoted: bool,
}

impl PatchReport {
    /// Every required bundle is present locally.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.not_started.is_empty()
    }
}

/// Explicitly owned session state; see the module docs for the lifecycle.
pub struct PatchSession {
    config: PatchConfig,
    layout: SandboxLayout,
    endpoints: RemoteEndpoints,
    verifier: IntegrityVerifier,
    cache: CacheIndex,
    source: Arc<dyn ManifestSource>,
    downloader: Downloader,
    builtin: Arc<Manifest>,
    local: Arc<Manifest>,
    remote: Option<Arc<Manifest>>,
    state: SessionState,
    failure: Option<PatchError>,
}

/// Builtin manifest shipped in the package, or an empty one if absent.
pub fn load_builtin_manifest(layout: &SandboxLayout, file_name: &str) -> Result<Manifest> {
    let path = layout.builtin_root().join(file_name);
    Ok(manifest::load_from_path(&path)?.unwrap_or_else(|| {
        tracing::info!(path = %path.display(), "no builtin manifest; starting empty");
        Manifest::empty()
    }))
}

impl PatchSession {
    /// Open the sandbox: cache index, app-version metadata, and the local
    /// manifest (defaulting to `builtin` when none was persisted).
    pub async fn open(
        config: PatchConfig,
        app_version: &str,
        builtin: Manifest,
        transport: Arc<dyn Transport>,
        source: Arc<dyn ManifestSource>,
    ) -> Result<Self> {
        let layout =
            SandboxLayout::from_overrides(config.sandbox_dir.as_deref(), config.builtin_dir.as_deref())?;
        Self::open_in(layout, config, app_version, builtin, transport, source).await
    }

    /// Like [`open`](Self::open) with an explicit layout.
    pub async fn open_in(
        layout: SandboxLayout,
        config: PatchConfig,
        app_version: &str,
        builtin: Manifest,
        transport: Arc<dyn Transport>,
        source: Arc<dyn ManifestSource>,
    ) -> Result<Self> {
        std::fs::create_dir_all(layout.sandbox_root())
            .with_context(|| format!("create sandbox: {}", layout.sandbox_root().display()))?;

        let cache = CacheIndex::open_at(layout.cache_db_path())
            .await
            .context("open cache index")?;
        reconcile_app_version(
            &layout.patch_cache_path(),
            app_version,
            config.clear_cache_on_version_change,
            &cache,
        )
        .await?;

        let builtin = Arc::new(builtin);
        let local_path = layout.manifest_path(&config.manifest_file_name);
        let local = match manifest::load_from_path(&local_path) {
            Ok(Some(m)) => Arc::new(m),
            Ok(None) => Arc::clone(&builtin),
            Err(e) => {
                tracing::warn!("ignoring unreadable local manifest: {:#}", e);
                Arc::clone(&builtin)
            }
        };

        let verifier = IntegrityVerifier::for_kind(config.checksum);
        let endpoints = RemoteEndpoints::from_config(&config);
        let downloader = Downloader::new(
            transport,
            verifier.clone(),
            cache.clone(),
            DownloadOptions::from_config(&config),
        );

        tracing::info!(
            sandbox = %layout.sandbox_root().display(),
            local_version = local.resource_version(),
            cached = cache.len(),
            mode = ?config.play_mode,
            "patch session opened"
        );

        Ok(Self {
            config,
            layout,
            endpoints,
            verifier,
            cache,
            source,
            downloader,
            builtin,
            local,
            remote: None,
            state: SessionState::Uninitialized,
            failure: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Cause of the `Failed` state, if any.
    pub fn failure(&self) -> Option<&PatchError> {
        self.failure.as_ref()
    }

    pub fn layout(&self) -> &SandboxLayout {
        &self.layout
    }

    pub fn cache(&self) -> &CacheIndex {
        &self.cache
    }

    pub fn local_manifest(&self) -> &Arc<Manifest> {
        &self.local
    }

    pub fn remote_manifest(&self) -> Option<&Arc<Manifest>> {
        self.remote.as_ref()
    }

    /// Resource version of the local manifest.
    pub fn resource_version(&self) -> u32 {
        self.local.resource_version()
    }

    /// Sorted tags declared by the local manifest.
    pub fn manifest_builtin_tags(&self) -> Vec<String> {
        self.local.builtin_tags()
    }

    /// Manifest downloads are resolved against: remote when fetched, else local.
    fn target(&self) -> Arc<Manifest> {
        self.remote.clone().unwrap_or_else(|| Arc::clone(&self.local))
    }

    fn expect_state(&self, allowed: &[SessionState], expected: &'static str) -> Result<(), PatchError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(PatchError::InvalidState {
                expected,
                found: self.state.name(),
            })
        }
    }

    fn fail(&mut self, err: PatchError) -> anyhow::Error {
        tracing::error!(state = %self.state, "patch session failed: {}", err);
        self.state = SessionState::Failed;
        self.failure = Some(err.clone());
        err.into()
    }

    /// Fetch and parse the remote manifest for `resource_version`.
    ///
    /// Primary host first, then fallback. A network or parse failure leaves
    /// the session `Failed` with local state untouched. Offline mode skips the
    /// fetch and targets the local manifest.
    pub async fn initialize(&mut self, resource_version: u32) -> Result<()> {
        self.expect_state(
            &[SessionState::Uninitialized, SessionState::Reconciled],
            "uninitialized or reconciled",
        )?;

        if self.config.play_mode == PlayMode::Offline {
            self.remote = None;
            self.state = SessionState::ManifestReady;
            tracing::info!(version = self.local.resource_version(), "offline mode; using local manifest");
            return Ok(());
        }

        self.state = SessionState::FetchingRemoteManifest;
        let file = self.config.manifest_file_name.clone();
        let urls = [
            self.endpoints.primary_url(resource_version, &file),
            self.endpoints.fallback_url(resource_version, &file),
        ];
        let timeout = self.config.task_timeout();

        let mut last_error = String::new();
        let mut text = None;
        for url in urls {
            let source = Arc::clone(&self.source);
            let fetch_url = url.clone();
            match tokio::task::spawn_blocking(move || source.fetch_text(&fetch_url, timeout)).await {
                Ok(Ok(body)) => {
                    tracing::debug!(url = %url, bytes = body.len(), "remote manifest fetched");
                    text = Some(body);
                    break;
                }
                Ok(Err(e)) => {
                    tracing::warn!(url = %url, "manifest fetch failed: {}", e);
                    last_error = format!("{}: {}", url, e);
                }
                Err(e) => last_error = format!("{}: fetch task join: {}", url, e),
            }
        }
        let Some(text) = text else {
            return Err(self.fail(PatchError::NetworkFailure {
                resource: file,
                reason: last_error,
            }));
        };

        let remote = match manifest::from_json(&text) {
            Ok(m) => m,
            Err(e) => return Err(self.fail(PatchError::ManifestParseFailure(format!("{:#}", e)))),
        };
        if remote.resource_version() != resource_version {
            tracing::warn!(
                requested = resource_version,
                received = remote.resource_version(),
                "remote manifest version differs from the requested one"
            );
        }

        tracing::info!(
            local = self.local.resource_version(),
            remote = remote.resource_version(),
            bundles = remote.bundles().len(),
            "remote manifest ready"
        );
        self.remote = Some(Arc::new(remote));
        self.state = SessionState::ManifestReady;
        Ok(())
    }

    pub async fn download(&mut self, request: Request, cancel: CancelToken) -> Result<PatchReport> {
        self.download_with_progress(request, cancel, None).await
    }

    /// Resolve `request`, download what is missing, and promote the target
    /// manifest when the whole batch succeeded.
    pub async fn download_with_progress(
        &mut self,
        request: Request,
        cancel: CancelToken,
        progress_tx: Option<mpsc::Sender<ProgressStats>>,
    ) -> Result<PatchReport> {
        self.expect_state(
            &[
                SessionState::ManifestReady,
                SessionState::Downloading,
                SessionState::Reconciled,
            ],
            "manifest-ready, downloading, or reconciled",
        )?;
        let resume_state = self.state;

        self.state = SessionState::ResolvingDownloads;
        let target = self.target();
        let plan = {
            let resolver = BundleResolver::new(
                &target,
                &self.builtin,
                &self.cache,
                &self.layout,
                &self.endpoints,
                &self.verifier,
            );
            match resolver.compute_download_list(&request).await {
                Ok(plan) => plan,
                Err(e) => {
                    // The index can be retried later; the session stays usable.
                    self.state = resume_state;
                    return Err(e.into());
                }
            }
        };

        let mut report = PatchReport {
            resource_version: target.resource_version(),
            skipped_builtin: plan.skipped_builtin.len(),
            skipped_cached: plan.skipped_cached.len() + plan.verified_cached.len(),
            shared_hash: plan.shared_hash.len(),
            unresolved: plan.unresolved.clone(),
            ..PatchReport::default()
        };

        self.state = SessionState::Downloading;
        if self.config.play_mode == PlayMode::Offline {
            for task in plan.tasks {
                report.failed.push((
                    task.hash.clone(),
                    PatchError::NetworkFailure {
                        resource: task.hash,
                        reason: "offline mode".to_string(),
                    },
                ));
            }
        } else if !plan.tasks.is_empty() {
            tracing::info!(
                tasks = plan.tasks.len(),
                bytes = plan.download_bytes(),
                "downloading bundles"
            );
            let summary = self
                .downloader
                .execute(plan.tasks, cancel, progress_tx)
                .finish()
                .await?;
            report.downloaded = summary.succeeded.len();
            report.failed = summary.failed;
            report.not_started = summary.not_started;
            report.bytes_transferred = summary.bytes_transferred;
            report.cancelled = summary.cancelled;
        }

        if !report.is_complete() {
            tracing::warn!(
                failed = report.failed.len(),
                not_started = report.not_started.len(),
                "batch incomplete; local manifest unchanged"
            );
            return Ok(report);
        }

        if let Some(remote) = self.remote.take() {
            let path = self.layout.manifest_path(&self.config.manifest_file_name);
            if let Err(e) = manifest::save_to_path(&path, &remote) {
                self.remote = Some(remote);
                return Err(e.context("persist promoted manifest"));
            }
            tracing::info!(
                from = self.local.resource_version(),
                to = remote.resource_version(),
                "local manifest promoted"
            );
            self.local = remote;
            report.promoted = true;
        }
        self.state = SessionState::Reconciled;
        Ok(report)
    }

    /// Lookup provider for the current play mode, over the target manifest.
    pub fn bundle_services(&self) -> Arc<dyn BundleServices> {
        match self.config.play_mode {
            PlayMode::Host => Arc::new(HostBundleServices {
                manifest: self.target(),
                builtin: Arc::clone(&self.builtin),
                cache: self.cache.clone(),
                layout: self.layout.clone(),
                endpoints: self.endpoints.clone(),
                verifier: self.verifier.clone(),
            }),
            PlayMode::Offline => Arc::new(OfflineBundleServices {
                manifest: Arc::clone(&self.local),
                builtin: Arc::clone(&self.builtin),
                layout: self.layout.clone(),
            }),
        }
    }

    /// Manifest path inside the sandbox.
    pub fn local_manifest_path(&self) -> PathBuf {
        self.layout.manifest_path(&self.config.manifest_file_name)
    }

    /// Flush and close the cache index.
    pub async fn shutdown(self) {
        self.cache.close().await;
        tracing::info!(state = %self.state, "patch session closed");
    }
}
