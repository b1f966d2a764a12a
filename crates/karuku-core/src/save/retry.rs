//! Generic retry with linear backoff.
//!
//! Not tied to any particular I/O call: the operation and the "is this
//! outcome worth another attempt" predicate are both supplied by the caller.

use std::time::Duration;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before attempt n+1 is `base_delay * n`
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(350),
            max_delay: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the `attempt`-th failure (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempt.max(1))
            .min(self.max_delay)
    }
}

/// Run `op` until `should_retry` rejects its outcome or attempts run out.
///
/// `op` receives the 1-based attempt number. Returns the last outcome and
/// the number of attempts made. Blocks the calling thread between attempts.
pub fn retry<T, F, P>(policy: &RetryPolicy, mut op: F, should_retry: P) -> (T, u32)
where
    F: FnMut(u32) -> T,
    P: Fn(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = op(attempt);
        if attempt >= max_attempts || !should_retry(&outcome) {
            return (outcome, attempt);
        }
        let delay = policy.delay_after(attempt);
        tracing::debug!(
            "Attempt {}/{} failed, retrying in {:?}",
            attempt,
            max_attempts,
            delay
        );
        std::thread::sleep(delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_linear_backoff_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(350));
        assert_eq!(policy.delay_after(2), Duration::from_millis(700));
        assert_eq!(policy.delay_after(10), Duration::from_millis(1500));
    }

    #[test]
    fn test_stops_on_success() {
        let (outcome, attempts) = retry(&fast(5), |n| n >= 3, |ok| !ok);
        assert!(outcome);
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let (outcome, attempts) = retry(
            &fast(2),
            |_| {
                calls += 1;
                Err::<(), _>("locked")
            },
            |r| r.is_err(),
        );
        assert!(outcome.is_err());
        assert_eq!(attempts, 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_non_retryable_outcome_returns_immediately() {
        let (outcome, attempts) = retry(&fast(5), |_| Err::<(), _>("denied"), |_| false);
        assert_eq!(outcome, Err("denied"));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let (_, attempts) = retry(&fast(0), |_| (), |_| true);
        assert_eq!(attempts, 1);
    }
}
