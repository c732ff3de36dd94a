//! `bpatch clear-cache` – forget every cache index entry.
//!
//! Bundle files stay on disk; the next update re-verifies and re-registers them.

use anyhow::Result;
use bpatch_core::cache_index::CacheIndex;
use bpatch_core::config::PatchConfig;

use super::layout;

pub async fn run_clear_cache(cfg: &PatchConfig) -> Result<()> {
    let layout = layout(cfg)?;
    let cache = CacheIndex::open_at(layout.cache_db_path()).await?;
    let before = cache.len();
    cache.clear().await?;
    cache.close().await;
    println!("Cleared {} cache index entr{}.", before, if before == 1 { "y" } else { "ies" });
    Ok(())
}
