//! Error taxonomy for patch sessions.
//!
//! Per-transfer failures live in [`crate::retry::TransferError`]; this enum is
//! what callers see at the session and resolver boundaries.

use std::fmt;

use thiserror::Error;

/// What kind of request item a manifest lookup failed for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManifestItem {
    #[default]
    AssetPath,
    Bundle,
}

impl fmt::Display for ManifestItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestItem::AssetPath => f.write_str("asset path"),
            ManifestItem::Bundle => f.write_str("bundle"),
        }
    }
}

/// Typed failures surfaced by the resolver, cache index, and session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// A requested asset path (or bundle name) has no entry in the manifest.
    /// Recoverable: resolution continues for the remaining items.
    #[error("{kind} not found in manifest: {item}")]
    ManifestInconsistency { kind: ManifestItem, item: String },

    /// Transport-level failure after the retry budget was spent. `resource`
    /// is a bundle hash or the manifest file name.
    #[error("network failure for {resource}: {reason}")]
    NetworkFailure { resource: String, reason: String },

    /// Downloaded bytes did not match the expected size or checksum.
    #[error("integrity mismatch for {hash}: {reason}")]
    IntegrityMismatch { hash: String, reason: String },

    /// Manifest text could not be decoded or failed validation. Fatal to the session.
    #[error("manifest parse failure: {0}")]
    ManifestParseFailure(String),

    /// The cache index could not persist a verified download.
    #[error("cache index write failed after {attempts} attempt(s): {reason}")]
    CacheIndexWriteFailure { attempts: u32, reason: String },

    /// A session operation was called in a state that does not allow it.
    #[error("invalid session state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
}
