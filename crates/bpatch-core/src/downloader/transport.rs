//! Transport seams: how bundle bytes and manifest text are fetched.
//!
//! Implementations are blocking; the downloader and session call them on the
//! blocking pool.

use std::path::Path;
use std::time::Duration;

use crate::retry::TransferError;

/// Transfers one URL into a local file.
pub trait Transport: Send + Sync + 'static {
    /// Fetch `url` into `dest`, returning the number of bytes written.
    /// A transfer that aborts midway may leave partial bytes next to `dest`.
    fn fetch(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64, TransferError>;
}

/// Fetches a manifest document as text.
pub trait ManifestSource: Send + Sync + 'static {
    fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, TransferError>;
}
