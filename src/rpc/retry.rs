//! Retry and backoff utility
//!
//! `ExponentialBackoff` computes `min(base * 2^attempt, max) + jitter`;
//! `retry_with_backoff` drives an async operation with it, asking a predicate
//! whether an error is worth another attempt and calling a hook on every
//! retryable failure (the fetch wrapper uses it to rotate credentials).
//! The reward scheduler reuses `ExponentialBackoff` for its error delay.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff calculator with additive jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay
    jitter: Duration,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter,
        }
    }

    /// Delay for a zero-based attempt, without jitter
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u128.saturating_pow(attempt.min(32));
        let delay_ms = self.base_delay.as_millis().saturating_mul(multiplier);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }

    /// Delay for a zero-based attempt, jitter in `[0, jitter)` included
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay_for(attempt) + self.random_jitter()
    }

    fn random_jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for ExponentialBackoff {
    /// 2s doubling to 64s, plus up to 1s jitter
    fn default() -> Self {
        Self::new(
            Duration::from_millis(2_000),
            Duration::from_millis(64_000),
            Duration::from_millis(1_000),
        )
    }
}

/// How many times to retry and how long to wait in between
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    pub backoff: ExponentialBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: ExponentialBackoff::default(),
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. The last error is returned on exhaustion.
///
/// `on_retryable` is called for every retryable failure with the attempt
/// number and the delay before the next attempt (`None` once exhausted).
/// No delay is applied before the first attempt.
pub async fn retry_with_backoff<T, E, Op, Fut, P, H>(
    policy: &RetryPolicy,
    mut op: Op,
    is_retryable: P,
    mut on_retryable: H,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    H: FnMut(u32, &E, Option<Duration>),
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }

                if attempt >= policy.max_retries {
                    on_retryable(attempt, &err, None);
                    return Err(err);
                }

                let delay = policy.backoff.delay_for(attempt);
                on_retryable(attempt, &err, Some(delay));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff: ExponentialBackoff::new(
                Duration::from_millis(1),
                Duration::from_millis(4),
                Duration::ZERO,
            ),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let backoff = ExponentialBackoff::default();
        for k in 0..10u32 {
            let expected = (2_000u64 * 2u64.pow(k)).min(64_000);
            assert_eq!(backoff.base_delay_for(k), Duration::from_millis(expected));

            let jittered = backoff.delay_for(k);
            assert!(jittered >= Duration::from_millis(expected));
            assert!(jittered < Duration::from_millis(expected + 1_000));
        }
        assert_eq!(backoff.base_delay_for(200), Duration::from_millis(64_000));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let mut hooks = Vec::new();

        let result: Result<u32, &str> = retry_with_backoff(
            &fast_policy(5),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("busy")
                    } else {
                        Ok(attempt)
                    }
                }
            },
            |_| true,
            |attempt, _, delay| hooks.push((attempt, delay.is_some())),
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(hooks, vec![(0, true), (1, true)]);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(
            &fast_policy(5),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("bad request") }
            },
            |_| false,
            |_, _, _| panic!("hook must not run for non-retryable errors"),
        )
        .await;

        assert_eq!(result, Err("bad request"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let mut exhausted = false;
        let result: Result<(), String> = retry_with_backoff(
            &fast_policy(2),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("fail {}", attempt)) }
            },
            |_| true,
            |_, _, delay| {
                if delay.is_none() {
                    exhausted = true;
                }
            },
        )
        .await;

        assert_eq!(result, Err("fail 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(exhausted);
    }
}
