//! Sandbox metadata: which app version populated the cache.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache_index::CacheIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchCacheMeta {
    pub app_version: String,
}

fn read(path: &Path) -> Result<Option<PatchCacheMeta>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    let meta = serde_json::from_str(&text)
        .with_context(|| format!("parse patch cache metadata: {}", path.display()))?;
    Ok(Some(meta))
}

fn write(path: &Path, meta: &PatchCacheMeta) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(meta)?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Load the metadata, creating it on first run. When the recorded app
/// version differs, the index is purged if `clear_on_change` is set and the
/// file is rewritten with `app_version`. Returns true if the index was purged.
pub async fn reconcile_app_version(
    path: &Path,
    app_version: &str,
    clear_on_change: bool,
    cache: &CacheIndex,
) -> Result<bool> {
    let current = PatchCacheMeta {
        app_version: app_version.to_string(),
    };
    let previous = match read(path) {
        Ok(meta) => meta,
        Err(e) => {
            // Unreadable metadata is treated like a version change.
            tracing::warn!("{:#}", e);
            Some(PatchCacheMeta {
                app_version: String::new(),
            })
        }
    };

    let Some(previous) = previous else {
        tracing::info!(app_version, "creating patch cache metadata");
        write(path, &current)?;
        return Ok(false);
    };
    if previous == current {
        return Ok(false);
    }

    tracing::info!(
        from = %previous.app_version,
        to = app_version,
        "app version changed since the sandbox was populated"
    );
    let purged = if clear_on_change {
        cache.clear().await?;
        true
    } else {
        false
    };
    write(path, &current)?;
    Ok(purged)
}
