//! Transfer error type for retry classification.

use std::fmt;
use std::time::Duration;

use crate::integrity::Mismatch;

/// Error returned by a single transfer attempt (transport failure, HTTP error,
/// storage failure, or a body that failed verification).
/// Used so we can classify and decide retries before converting to anyhow.
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Any other transport failure reported as text (non-curl transports).
    Transport(String),
    /// Transfer completed but fewer bytes were written than announced
    /// (e.g. server closed early).
    PartialTransfer { expected: u64, received: u64 },
    /// Disk/storage write failed (e.g. disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// Transfer completed but the file failed size/checksum verification.
    Integrity(Mismatch),
    /// The attempt exceeded the per-task timeout.
    TimedOut(Duration),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::Transport(msg) => write!(f, "transport: {}", msg),
            TransferError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            TransferError::Storage(e) => write!(f, "storage: {}", e),
            TransferError::Integrity(m) => write!(f, "integrity: {}", m),
            TransferError::TimedOut(d) => write!(f, "timed out after {:?}", d),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Storage(e) => Some(e),
            _ => None,
        }
    }
}
