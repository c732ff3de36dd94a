//! Read-only bundle lookups for the asset-loading side.
//!
//! Providers are chosen by play mode when the session hands them out and
//! hold `Arc` snapshots of the manifests, so a later promotion does not
//! change answers already being served.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache_index::CacheIndex;
use crate::endpoints::RemoteEndpoints;
use crate::integrity::IntegrityVerifier;
use crate::manifest::Manifest;
use crate::resolver::{builtin_identical, BundleResolver};
use crate::storage::SandboxLayout;

/// Where a bundle's bytes can be loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    pub bundle_name: String,
    /// Local file to load. For remote bundles this is where the download lands.
    /// `None` when the bundle is unknown.
    pub load_path: Option<PathBuf>,
    pub is_remote: bool,
    pub remote_url: Option<String>,
    pub fallback_url: Option<String>,
}

impl BundleInfo {
    fn unknown(bundle_name: &str) -> Self {
        Self {
            bundle_name: bundle_name.to_string(),
            load_path: None,
            is_remote: false,
            remote_url: None,
            fallback_url: None,
        }
    }

    fn local(bundle_name: &str, path: PathBuf) -> Self {
        Self {
            load_path: Some(path),
            ..Self::unknown(bundle_name)
        }
    }
}

/// Lookups the loader needs; one provider per play mode.
pub trait BundleServices: Send + Sync {
    fn bundle_info(&self, bundle_name: &str) -> BundleInfo;
    fn bundle_name_for_asset(&self, asset_path: &str) -> Option<String>;
    /// Transitive dependencies of the asset's bundle, excluding that bundle.
    fn all_dependencies(&self, asset_path: &str) -> Vec<String>;
}

/// Host mode: builtin, then sandbox cache, then the patch server.
pub struct HostBundleServices {
    pub(crate) manifest: Arc<Manifest>,
    pub(crate) builtin: Arc<Manifest>,
    pub(crate) cache: CacheIndex,
    pub(crate) layout: SandboxLayout,
    pub(crate) endpoints: RemoteEndpoints,
    pub(crate) verifier: IntegrityVerifier,
}

impl BundleServices for HostBundleServices {
    fn bundle_info(&self, bundle_name: &str) -> BundleInfo {
        let Some(record) = self.manifest.bundle(bundle_name) else {
            tracing::warn!(bundle = bundle_name, "bundle info requested for unknown bundle");
            return BundleInfo::unknown(bundle_name);
        };

        let resolver = BundleResolver::new(
            &self.manifest,
            &self.builtin,
            &self.cache,
            &self.layout,
            &self.endpoints,
            &self.verifier,
        );
        if resolver.is_builtin_identical(record) {
            return BundleInfo::local(bundle_name, self.layout.builtin_file_path(record.hash()));
        }

        let cached = self.layout.cache_file_path(record.hash());
        if self.cache.contains(record.hash()) {
            if cached.is_file() {
                return BundleInfo::local(bundle_name, cached);
            }
            tracing::error!(
                bundle = bundle_name,
                hash = record.hash(),
                "cache index lists bundle but its file is missing; loading remotely"
            );
        }

        BundleInfo {
            bundle_name: bundle_name.to_string(),
            load_path: Some(cached),
            is_remote: true,
            remote_url: Some(self.endpoints.primary_url(record.version(), record.hash())),
            fallback_url: Some(self.endpoints.fallback_url(record.version(), record.hash())),
        }
    }

    fn bundle_name_for_asset(&self, asset_path: &str) -> Option<String> {
        self.manifest.bundle_name_for_asset(asset_path).map(str::to_string)
    }

    fn all_dependencies(&self, asset_path: &str) -> Vec<String> {
        self.manifest.all_dependencies(asset_path)
    }
}

/// Offline mode: only what ships in the package or already sits in the sandbox.
pub struct OfflineBundleServices {
    pub(crate) manifest: Arc<Manifest>,
    pub(crate) builtin: Arc<Manifest>,
    pub(crate) layout: SandboxLayout,
}

impl BundleServices for OfflineBundleServices {
    fn bundle_info(&self, bundle_name: &str) -> BundleInfo {
        let Some(record) = self.manifest.bundle(bundle_name) else {
            tracing::warn!(bundle = bundle_name, "bundle info requested for unknown bundle");
            return BundleInfo::unknown(bundle_name);
        };
        // A promoted manifest may flag a bundle builtin after its hash moved on;
        // those bytes only exist in the sandbox cache.
        if builtin_identical(&self.builtin, record) {
            return BundleInfo::local(bundle_name, self.layout.builtin_file_path(record.hash()));
        }
        let cached = self.layout.cache_file_path(record.hash());
        if cached.is_file() {
            return BundleInfo::local(bundle_name, cached);
        }
        tracing::warn!(bundle = bundle_name, "bundle is not available offline");
        BundleInfo::unknown(bundle_name)
    }

    fn bundle_name_for_asset(&self, asset_path: &str) -> Option<String> {
        self.manifest.bundle_name_for_asset(asset_path).map(str::to_string)
    }

    fn all_dependencies(&self, asset_path: &str) -> Vec<String> {
        self.manifest.all_dependencies(asset_path)
    }
}
