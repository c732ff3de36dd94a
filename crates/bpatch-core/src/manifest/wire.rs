//! JSON wire format and sandbox persistence for manifests.

use anyhow::{Context, Result};
use std::path::Path;

use super::types::Manifest;

/// Serialize a manifest to pretty JSON.
pub fn to_json(manifest: &Manifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("serialize manifest")
}

/// Parse and validate a manifest. Any structural error rejects the whole text.
pub fn from_json(text: &str) -> Result<Manifest> {
    serde_json::from_str(text).context("parse manifest")
}

/// Write the manifest atomically: temp file in the same directory, then rename.
pub fn save_to_path(path: &Path, manifest: &Manifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = to_json(manifest)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("write manifest: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Load a manifest from disk. A missing file yields `None`; an unreadable or
/// invalid file is an error.
pub fn load_from_path(path: &Path) -> Result<Option<Manifest>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read manifest: {}", path.display())),
    };
    let manifest = from_json(&text).with_context(|| format!("manifest at {}", path.display()))?;
    Ok(Some(manifest))
}
