//! Classify HTTP status, curl errors, and transfer errors into retry policy error kinds.

use crate::retry::error::TransferError;
use crate::retry::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        400..=499 => ErrorKind::Rejected(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify a transfer error into an ErrorKind.
pub fn classify(e: &TransferError) -> ErrorKind {
    match e {
        TransferError::Curl(ce) => classify_curl_error(ce),
        TransferError::Http(code) => classify_http_status(*code),
        TransferError::Transport(_) | TransferError::PartialTransfer { .. } => {
            ErrorKind::Connection
        }
        TransferError::Storage(_) => ErrorKind::Storage,
        TransferError::Integrity(_) => ErrorKind::Integrity,
        TransferError::TimedOut(_) => ErrorKind::Timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::Mismatch;
    use std::time::Duration;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), ErrorKind::Http5xx(502)));
    }

    #[test]
    fn http_4xx_rejected() {
        assert_eq!(classify_http_status(404), ErrorKind::Rejected(404));
        assert_eq!(classify_http_status(403), ErrorKind::Rejected(403));
    }

    #[test]
    fn transfer_errors_map_to_kinds() {
        assert_eq!(
            classify(&TransferError::Transport("reset".into())),
            ErrorKind::Connection
        );
        assert_eq!(
            classify(&TransferError::PartialTransfer {
                expected: 10,
                received: 3
            }),
            ErrorKind::Connection
        );
        assert_eq!(
            classify(&TransferError::Integrity(Mismatch::Missing)),
            ErrorKind::Integrity
        );
        assert_eq!(
            classify(&TransferError::TimedOut(Duration::from_secs(1))),
            ErrorKind::Timeout
        );
        assert_eq!(
            classify(&TransferError::Storage(std::io::Error::other("disk full"))),
            ErrorKind::Storage
        );
    }
}
