use std::time::Duration;

/// Retry-relevant shape of a failed bundle attempt. See [`super::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read, or per-task timeout).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, short body, etc.).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// 4xx from one host; the other host may still serve the file.
    Rejected(u16),
    /// Body arrived but failed size/checksum verification.
    Integrity,
    /// Local disk failure; retrying the network will not help.
    Storage,
    /// Any other error.
    Other,
}

impl ErrorKind {
    /// Integrity failures may point at server-side corruption and are logged apart.
    pub fn is_integrity(self) -> bool {
        matches!(self, ErrorKind::Integrity)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Attempt budget and backoff shared by every task of a batch.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first), across both hosts.
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Which host an attempt targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    Primary,
    Fallback,
}

impl RetryPolicy {
    /// Decide what to do after attempt `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || kind == ErrorKind::Storage {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff(attempt))
    }

    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay)
    }

    /// Odd attempts go to the primary host, even attempts to the fallback,
    /// so any budget of two or more touches both.
    pub fn host_for(attempt: u32) -> Host {
        if attempt % 2 == 0 {
            Host::Fallback
        } else {
            Host::Primary
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }

    #[test]
    fn storage_errors_stop_immediately() {
        assert_eq!(policy(5).decide(1, ErrorKind::Storage), RetryDecision::NoRetry);
    }

    #[test]
    fn every_other_kind_consumes_a_retry() {
        let p = policy(5);
        for kind in [
            ErrorKind::Timeout,
            ErrorKind::Throttled,
            ErrorKind::Connection,
            ErrorKind::Http5xx(502),
            ErrorKind::Rejected(404),
            ErrorKind::Integrity,
            ErrorKind::Other,
        ] {
            assert_eq!(
                p.decide(1, kind),
                RetryDecision::RetryAfter(Duration::from_millis(100)),
                "{kind:?}"
            );
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let p = policy(10);
        let delays: Vec<u64> = (1..=6).map(|a| p.backoff(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(p.backoff(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn budget_counts_both_hosts() {
        let p = policy(3);
        assert!(matches!(p.decide(2, ErrorKind::Connection), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, ErrorKind::Connection), RetryDecision::NoRetry);
        assert_eq!(policy(1).decide(1, ErrorKind::Timeout), RetryDecision::NoRetry);
    }

    #[test]
    fn attempts_alternate_hosts() {
        let hosts: Vec<Host> = (1..=4).map(RetryPolicy::host_for).collect();
        assert_eq!(
            hosts,
            vec![Host::Primary, Host::Fallback, Host::Primary, Host::Fallback]
        );
    }
}
