//! `bpatch checksum` – print the configured digest of a file.

use anyhow::Result;
use bpatch_core::checksum::{self, ContentDigest};
use bpatch_core::config::PatchConfig;
use std::path::Path;

pub async fn run_checksum(cfg: &PatchConfig, path: &Path) -> Result<()> {
    let digest = checksum::digest_for(cfg.checksum);
    let value = digest.digest_path(path)?;
    println!("{}  {}  ({})", value, path.display(), digest.name());
    Ok(())
}
