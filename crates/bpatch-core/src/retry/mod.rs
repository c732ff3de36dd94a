//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures, integrity mismatches) and exponential backoff
//! decisions so the downloader and manifest fetch share one policy.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::TransferError;
pub use policy::{ErrorKind, Host, RetryDecision, RetryPolicy};
