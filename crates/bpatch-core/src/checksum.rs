//! File checksums used by the integrity verifier.
//!
//! Digests stream the file in fixed-size chunks so memory stays bounded for
//! large bundles. The algorithm is pluggable through [`ContentDigest`].

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::config::ChecksumKind;

const BUF_SIZE: usize = 64 * 1024;

/// A checksum algorithm over file contents. Output is lowercase hex.
pub trait ContentDigest: Send + Sync {
    fn name(&self) -> &'static str;

    fn digest_path(&self, path: &Path) -> Result<String>;
}

/// CRC-32 (IEEE), rendered as 8 lowercase hex digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32;

/// SHA-256, rendered as 64 lowercase hex digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl ContentDigest for Crc32 {
    fn name(&self) -> &'static str {
        "crc32"
    }

    fn digest_path(&self, path: &Path) -> Result<String> {
        let mut hasher = crc32fast::Hasher::new();
        read_chunks(path, |chunk| hasher.update(chunk))?;
        Ok(format!("{:08x}", hasher.finalize()))
    }
}

impl ContentDigest for Sha256Digest {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest_path(&self, path: &Path) -> Result<String> {
        sha256_path(path)
    }
}

/// Digest implementation for the configured kind.
pub fn digest_for(kind: ChecksumKind) -> Arc<dyn ContentDigest> {
    match kind {
        ChecksumKind::Crc32 => Arc::new(Crc32),
        ChecksumKind::Sha256 => Arc::new(Sha256Digest),
    }
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    read_chunks(path, |chunk| hasher.update(chunk))?;
    Ok(hex::encode(hasher.finalize()))
}

/// CRC-32 of an in-memory buffer, same rendering as [`Crc32`].
pub fn crc32_bytes(data: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(data))
}

fn read_chunks(path: &Path, mut sink: impl FnMut(&[u8])) -> Result<()> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        sink(&buf[..n]);
    }
    Ok(())
}
