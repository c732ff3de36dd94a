//! Integrity verifier: decides whether a local bundle file can be trusted.
//!
//! Existence first, then size, then checksum. A missing or unreadable file is
//! simply "not verified"; nothing here returns an error to the caller.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::checksum::{self, ContentDigest};
use crate::config::ChecksumKind;

/// Why a file failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Missing,
    Size { expected: u64, actual: u64 },
    Checksum { expected: String, actual: String },
    Unreadable(String),
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Missing => write!(f, "file missing"),
            Mismatch::Size { expected, actual } => {
                write!(f, "size mismatch: expected {} bytes, found {}", expected, actual)
            }
            Mismatch::Checksum { expected, actual } => {
                write!(f, "checksum mismatch: expected {}, found {}", expected, actual)
            }
            Mismatch::Unreadable(e) => write!(f, "unreadable: {}", e),
        }
    }
}

#[derive(Clone)]
pub struct IntegrityVerifier {
    digest: Arc<dyn ContentDigest>,
}

impl fmt::Debug for IntegrityVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrityVerifier")
            .field("digest", &self.digest.name())
            .finish()
    }
}

impl Default for IntegrityVerifier {
    fn default() -> Self {
        Self::for_kind(ChecksumKind::default())
    }
}

impl IntegrityVerifier {
    pub fn new(digest: Arc<dyn ContentDigest>) -> Self {
        Self { digest }
    }

    pub fn for_kind(kind: ChecksumKind) -> Self {
        Self::new(checksum::digest_for(kind))
    }

    /// True when the file exists, has `expected_size` bytes, and its checksum
    /// matches `expected_checksum` (case-insensitive hex).
    pub fn verify(&self, path: &Path, expected_size: u64, expected_checksum: &str) -> bool {
        self.check(path, expected_size, expected_checksum).is_ok()
    }

    /// Like [`verify`](Self::verify) but reports which check failed.
    pub fn check(
        &self,
        path: &Path,
        expected_size: u64,
        expected_checksum: &str,
    ) -> Result<(), Mismatch> {
        let meta = match std::fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(Mismatch::Missing),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Mismatch::Missing),
            Err(e) => return Err(Mismatch::Unreadable(e.to_string())),
        };

        if meta.len() != expected_size {
            return Err(Mismatch::Size {
                expected: expected_size,
                actual: meta.len(),
            });
        }

        let actual = self
            .digest
            .digest_path(path)
            .map_err(|e| Mismatch::Unreadable(format!("{:#}", e)))?;
        if !actual.eq_ignore_ascii_case(expected_checksum.trim()) {
            return Err(Mismatch::Checksum {
                expected: expected_checksum.to_string(),
                actual,
            });
        }
        Ok(())
    }
}
