//! Bundle resolver: turns a request into the minimal list of download tasks.
//!
//! Candidates are expanded from the target manifest (asset closure, tag
//! selection, or explicit bundle names), then each candidate is classified:
//! verified in the cache, identical to a builtin bundle, or needs a download.
//! Classification is synchronous; only the bulk cache registration awaits.

use std::collections::HashSet;

use crate::cache_index::CacheIndex;
use crate::downloader::DownloadTask;
use crate::endpoints::RemoteEndpoints;
use crate::error::{ManifestItem, PatchError};
use crate::integrity::IntegrityVerifier;
use crate::manifest::{BundleRecord, Manifest};
use crate::storage::SandboxLayout;

/// Whether `record` can be loaded from the package: the builtin manifest
/// flags a bundle of the same name as builtin with the same hash.
pub fn builtin_identical(builtin: &Manifest, record: &BundleRecord) -> bool {
    builtin
        .bundle(record.name())
        .is_some_and(|b| b.is_builtin() && b.hash() == record.hash())
}


/// What the caller wants present locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Asset paths; each pulls in its bundle and that bundle's dependency closure.
    Assets(Vec<String>),
    /// DLC tags; selects tagged bundles plus every pure builtin bundle.
    Tags(Vec<String>),
    /// Bundle names; each pulls in its dependency closure.
    Bundles(Vec<String>),
}

impl Request {
    /// Kind of item an unresolved entry of this request names.
    pub fn item_kind(&self) -> ManifestItem {
        match self {
            Request::Bundles(_) => ManifestItem::Bundle,
            Request::Assets(_) | Request::Tags(_) => ManifestItem::AssetPath,
        }
    }
}

/// Why a candidate needs no transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Cached,
    Builtin,
    Download,
}

/// Result of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    /// Residual downloads, in candidate discovery order.
    pub tasks: Vec<DownloadTask>,
    /// Bundle names skipped because the cache index and the file agree.
    pub skipped_cached: Vec<String>,
    /// Bundle names skipped because the package ships identical bytes.
    pub skipped_builtin: Vec<String>,
    /// Hashes found on disk and verified during the second pass; not yet in the index.
    pub verified_cached: Vec<String>,
    /// Bundle names sharing a hash with an earlier candidate; that candidate's
    /// task or second-pass hit covers them.
    pub shared_hash: Vec<String>,
    /// Requested asset paths (or bundle names) absent from the manifest.
    pub unresolved: Vec<String>,
    pub unresolved_kind: ManifestItem,
}

impl ResolutionPlan {
    /// One `ManifestInconsistency` per unresolved request item.
    pub fn unresolved_errors(&self) -> Vec<PatchError> {
        self.unresolved
            .iter()
            .map(|item| PatchError::ManifestInconsistency {
                kind: self.unresolved_kind,
                item: item.clone(),
            })
            .collect()
    }

    pub fn download_bytes(&self) -> u64 {
        self.tasks.iter().map(|t| t.expected_size).sum()
    }
}

/// Borrowed view of everything classification needs.
pub struct BundleResolver<'a> {
    target: &'a Manifest,
    builtin: &'a Manifest,
    cache: &'a CacheIndex,
    layout: &'a SandboxLayout,
    endpoints: &'a RemoteEndpoints,
    verifier: &'a IntegrityVerifier,
}

impl<'a> BundleResolver<'a> {
    pub fn new(
        target: &'a Manifest,
        builtin: &'a Manifest,
        cache: &'a CacheIndex,
        layout: &'a SandboxLayout,
        endpoints: &'a RemoteEndpoints,
        verifier: &'a IntegrityVerifier,
    ) -> Self {
        Self {
            target,
            builtin,
            cache,
            layout,
            endpoints,
            verifier,
        }
    }

    /// Candidate bundle names for a request, deduplicated, in discovery order.
    /// The second vector holds request items the manifest does not know.
    pub fn candidates(&self, request: &Request) -> (Vec<String>, Vec<String>) {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        let mut unresolved = Vec::new();

        match request {
            Request::Assets(paths) => {
                for path in paths {
                    match self.target.bundle_name_for_asset(path) {
                        Some(name) => self.target.collect_closure(name, &mut visited, &mut out),
                        None => {
                            tracing::warn!(asset = %path, "asset path not found in manifest");
                            unresolved.push(path.clone());
                        }
                    }
                }
            }
            Request::Tags(tags) => {
                for record in self.target.bundles() {
                    if (record.has_any_tag(tags) || record.is_pure_builtin())
                        && visited.insert(record.name().to_string())
                    {
                        out.push(record.name().to_string());
                    }
                }
            }
            Request::Bundles(names) => {
                for name in names {
                    if self.target.bundle(name).is_some() {
                        self.target.collect_closure(name, &mut visited, &mut out);
                    } else {
                        tracing::warn!(bundle = %name, "bundle not found in manifest");
                        unresolved.push(name.clone());
                    }
                }
            }
        }
        (out, unresolved)
    }

    /// First matching rule wins: cached, then builtin-identical, then download.
    pub fn classify(&self, record: &BundleRecord) -> Classification {
        if self.cache.contains(record.hash()) {
            if self.file_is_valid(record) {
                return Classification::Cached;
            }
            tracing::debug!(
                bundle = record.name(),
                hash = record.hash(),
                "cache index lists bundle but the file is missing or corrupt"
            );
        }
        if self.is_builtin_identical(record) {
            return Classification::Builtin;
        }
        Classification::Download
    }

    /// True when the builtin manifest ships the same name and hash as a builtin bundle.
    pub fn is_builtin_identical(&self, record: &BundleRecord) -> bool {
        builtin_identical(self.builtin, record)
    }

    fn file_is_valid(&self, record: &BundleRecord) -> bool {
        self.verifier.verify(
            &self.layout.cache_file_path(record.hash()),
            record.size_bytes(),
            record.checksum(),
        )
    }

    fn task_for(&self, record: &BundleRecord) -> DownloadTask {
        DownloadTask {
            bundle_name: record.name().to_string(),
            hash: record.hash().to_string(),
            target_path: self.layout.cache_file_path(record.hash()),
            primary_url: self.endpoints.primary_url(record.version(), record.hash()),
            fallback_url: self.endpoints.fallback_url(record.version(), record.hash()),
            expected_size: record.size_bytes(),
            expected_checksum: record.checksum().to_string(),
        }
    }

    /// Classify every candidate without touching the cache index.
    pub fn resolve(&self, request: &Request) -> ResolutionPlan {
        let (names, unresolved) = self.candidates(request);
        let mut plan = ResolutionPlan {
            unresolved,
            unresolved_kind: request.item_kind(),
            ..ResolutionPlan::default()
        };
        let mut queued: HashSet<&str> = HashSet::new();

        for name in &names {
            let Some(record) = self.target.bundle(name) else {
                continue;
            };
            match self.classify(record) {
                Classification::Cached => plan.skipped_cached.push(name.clone()),
                Classification::Builtin => plan.skipped_builtin.push(name.clone()),
                Classification::Download => {
                    // Two names with one hash share a file; fetch it once.
                    if queued.insert(record.hash()) {
                        plan.tasks.push(self.task_for(record));
                    } else {
                        plan.shared_hash.push(name.clone());
                    }
                }
            }
        }

        // Second pass: files already on disk (e.g. written before a lost index
        // update) are verified and moved aside instead of fetched again.
        let mut residual = Vec::with_capacity(plan.tasks.len());
        for task in plan.tasks.drain(..) {
            if self
                .verifier
                .verify(&task.target_path, task.expected_size, &task.expected_checksum)
            {
                plan.verified_cached.push(task.hash);
            } else {
                residual.push(task);
            }
        }
        plan.tasks = residual;

        tracing::debug!(
            candidates = names.len(),
            download = plan.tasks.len(),
            cached = plan.skipped_cached.len(),
            builtin = plan.skipped_builtin.len(),
            verified = plan.verified_cached.len(),
            shared_hash = plan.shared_hash.len(),
            unresolved = plan.unresolved.len(),
            "resolution finished"
        );
        plan
    }

    /// Resolve, then register the second-pass hashes in one bulk insert.
    pub async fn compute_download_list(&self, request: &Request) -> Result<ResolutionPlan, PatchError> {
        let plan = self.resolve(request);
        if !plan.verified_cached.is_empty() {
            self.cache.bulk_insert(&plan.verified_cached).await?;
        }
        Ok(plan)
    }
}
