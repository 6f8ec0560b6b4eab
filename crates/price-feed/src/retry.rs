//! Bounded exponential-backoff retry
//!
//! An operation runs at most `max_retries + 1` times. Between attempts the
//! executor sleeps `base_delay * 2^attempt` (200ms, 400ms, 800ms, ... with the
//! default base). The sleep races the cancellation token, so shutdown never
//! waits out a backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use oracle_core::RetryError;

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

/// Retry bounds for a single operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Policy that runs the operation exactly once
    pub fn no_retry() -> Self {
        Self::new(0, DEFAULT_BASE_DELAY)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff after the failed attempt `attempt` (0-indexed).
    ///
    /// Uncapped; saturates at `Duration::MAX` instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Run `operation` under `policy` until it succeeds, runs out of attempts or
/// `cancel` fires.
///
/// The operation receives the 0-indexed attempt number. An in-flight attempt
/// is never interrupted here; it is handed whatever cancellation it needs by
/// the caller. Cancellation observed before an attempt, during a backoff, or
/// right after a failed attempt ends the loop with [`RetryError::Cancelled`].
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        if attempt >= policy.max_retries {
            return Err(RetryError::Exhausted {
                attempts: attempt + 1,
                last: err,
            });
        }

        let delay = policy.delay(attempt);
        debug!(attempt, ?delay, error = %err, "attempt failed, backing off");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(200))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = policy(5);

        assert_eq!(policy.delay(0), Duration::from_millis(200));
        assert_eq!(policy.delay(1), Duration::from_millis(400));
        assert_eq!(policy.delay(2), Duration::from_millis(800));
        assert_eq!(policy.delay(3), Duration::from_millis(1600));
    }

    #[test]
    fn test_delay_saturates() {
        assert_eq!(policy(0).delay(40), Duration::MAX);
        assert_eq!(policy(0).delay(u32::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let result: Result<u32, RetryError<&str>> = retry(&policy(3), &cancel, |_| {
            calls += 1;
            async { Ok(7) }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_last_attempt() {
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let result = retry(&policy(3), &cancel, |attempt| {
            calls += 1;
            async move {
                if attempt < 3 {
                    Err("boom")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_last_error() {
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let result: Result<(), _> = retry(&policy(2), &cancel, |attempt| {
            calls += 1;
            async move { Err(format!("failure {attempt}")) }
        })
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: "failure 2".to_string(),
            })
        );
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let cancel = CancellationToken::new();
        let mut started = Vec::new();

        let _: Result<(), _> = retry(&policy(3), &cancel, |_| {
            started.push(Instant::now());
            async { Err("boom") }
        })
        .await;

        let gaps: Vec<Duration> = started.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result: Result<(), _> = retry(&policy(5), &cancel, |_| async { Err("boom") }).await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_operation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;

        let result: Result<(), RetryError<&str>> = retry(&policy(3), &cancel, |_| {
            calls += 1;
            async { Ok(()) }
        })
        .await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(calls, 0);
    }
}
