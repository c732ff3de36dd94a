//! Sandbox layout and bundle file lifecycle.
//!
//! Downloaded bundles live under `<sandbox>/cache/<hash>`; bytes are streamed
//! into `<hash>.part` first and renamed into place once the transfer ends.
//! A `.part` file left behind by an aborted transfer is never deleted here.

mod writer;

pub use writer::BundleWriter;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

const CACHE_DIR: &str = "cache";
const CACHE_DB: &str = "cache.db";
const PATCH_CACHE_FILE: &str = "patch_cache.json";

/// Where bundles, manifests, and index files live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLayout {
    sandbox_root: PathBuf,
    builtin_root: PathBuf,
}

impl SandboxLayout {
    pub fn new(sandbox_root: impl Into<PathBuf>, builtin_root: impl Into<PathBuf>) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
            builtin_root: builtin_root.into(),
        }
    }

    /// XDG data dir for the sandbox (`~/.local/share/bpatch`) and
    /// `<sandbox>/builtin` for the package bundles, unless overridden.
    pub fn from_overrides(sandbox: Option<&Path>, builtin: Option<&Path>) -> Result<Self> {
        let sandbox_root = match sandbox {
            Some(p) => p.to_path_buf(),
            None => xdg::BaseDirectories::with_prefix("bpatch")?.get_data_home(),
        };
        let builtin_root = builtin
            .map(Path::to_path_buf)
            .unwrap_or_else(|| sandbox_root.join("builtin"));
        Ok(Self::new(sandbox_root, builtin_root))
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    pub fn builtin_root(&self) -> &Path {
        &self.builtin_root
    }

    /// Deterministic sandbox path for a content hash.
    pub fn cache_file_path(&self, hash: &str) -> PathBuf {
        self.sandbox_root.join(CACHE_DIR).join(hash)
    }

    /// Read-only path of a bundle shipped with the application.
    pub fn builtin_file_path(&self, hash: &str) -> PathBuf {
        self.builtin_root.join(hash)
    }

    pub fn manifest_path(&self, file_name: &str) -> PathBuf {
        self.sandbox_root.join(file_name)
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.sandbox_root.join(CACHE_DB)
    }

    pub fn patch_cache_path(&self) -> PathBuf {
        self.sandbox_root.join(PATCH_CACHE_FILE)
    }
}

/// Path for the temp file: appends `.part` to the final path (e.g. `ab12` → `ab12.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("ab12"));
        assert_eq!(p.to_string_lossy(), "ab12.part");
        let p2 = temp_path(Path::new("/tmp/cache/ff00"));
        assert_eq!(p2.to_string_lossy(), "/tmp/cache/ff00.part");
    }

    #[test]
    fn layout_paths_are_derived_from_hash() {
        let layout = SandboxLayout::new("/sandbox", "/app/bundles");
        assert_eq!(layout.cache_file_path("abc"), Path::new("/sandbox/cache/abc"));
        assert_eq!(layout.builtin_file_path("abc"), Path::new("/app/bundles/abc"));
        assert_eq!(
            layout.manifest_path("patch_manifest.json"),
            Path::new("/sandbox/patch_manifest.json")
        );
        assert_eq!(layout.cache_db_path(), Path::new("/sandbox/cache.db"));
        assert_eq!(layout.patch_cache_path(), Path::new("/sandbox/patch_cache.json"));
    }

    #[test]
    fn overrides_take_precedence() {
        let layout =
            SandboxLayout::from_overrides(Some(Path::new("/s")), None).unwrap();
        assert_eq!(layout.sandbox_root(), Path::new("/s"));
        assert_eq!(layout.builtin_root(), Path::new("/s/builtin"));

        let layout =
            SandboxLayout::from_overrides(Some(Path::new("/s")), Some(Path::new("/b"))).unwrap();
        assert_eq!(layout.builtin_root(), Path::new("/b"));
    }
}
