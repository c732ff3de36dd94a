//! `bpatch status` – show the local manifest and cache index.

use anyhow::Result;
use bpatch_core::cache_index::CacheIndex;
use bpatch_core::config::PatchConfig;
use bpatch_core::manifest;

use super::layout;

pub async fn run_status(cfg: &PatchConfig) -> Result<()> {
    let layout = layout(cfg)?;
    let manifest_path = layout.manifest_path(&cfg.manifest_file_name);
    match manifest::load_from_path(&manifest_path)? {
        Some(m) => {
            println!("Local manifest:    {}", manifest_path.display());
            println!("Resource version:  {}", m.resource_version());
            println!("Bundles:           {}", m.bundles().len());
            println!("Total size:        {} bytes", m.total_size());
            let tags = m.builtin_tags();
            if !tags.is_empty() {
                println!("Tags:              {}", tags.join(", "));
            }
        }
        None => println!("No local manifest yet (builtin manifest in use)."),
    }

    let cache = CacheIndex::open_at(layout.cache_db_path()).await?;
    println!("Cached bundles:    {}", cache.len());
    println!("Sandbox:           {}", layout.sandbox_root().display());
    cache.close().await;
    Ok(())
}
