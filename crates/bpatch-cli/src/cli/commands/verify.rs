//! `bpatch verify` – check a file against an expected size and checksum.

use anyhow::{bail, Result};
use bpatch_core::config::PatchConfig;
use bpatch_core::integrity::IntegrityVerifier;
use std::path::Path;

pub async fn run_verify(cfg: &PatchConfig, path: &Path, size: u64, checksum: &str) -> Result<()> {
    let verifier = IntegrityVerifier::for_kind(cfg.checksum);
    match verifier.check(path, size, checksum) {
        Ok(()) => {
            println!("OK  {}", path.display());
            Ok(())
        }
        Err(mismatch) => bail!("{}: {}", path.display(), mismatch),
    }
}
