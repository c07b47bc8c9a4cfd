//! Bounded retry around a whole operation, with a flat delay between attempts.

use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::{error, warn};

use crate::config::RetryConfig;
use crate::error::{TokenError, TokenResult};

#[derive(Debug, Clone, Copy)]
pub struct RetrySupervisor {
    max_attempts: usize,
    delay: Duration,
}

impl RetrySupervisor {
    /// A supervisor making at most `max_attempts` attempts (at least one).
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.delay())
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` attempts have failed. The closure receives the
    /// 1-based attempt number. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> TokenResult<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = TokenResult<T>>,
    {
        let max_attempts = self.max_attempts;
        let delay = self.delay;
        let strategy = FixedInterval::new(delay).take(max_attempts - 1);
        let mut attempt = 0usize;

        RetryIf::spawn(
            strategy,
            || {
                attempt += 1;
                let current = attempt;
                let fut = operation(current);
                async move {
                    let result = fut.await;
                    if let Err(e) = &result {
                        log_failure(current, max_attempts, delay, e);
                    }
                    result
                }
            },
            |e: &TokenError| e.is_retryable(),
        )
        .await
    }
}

fn log_failure(attempt: usize, max_attempts: usize, delay: Duration, err: &TokenError) {
    if attempt < max_attempts && err.is_retryable() {
        warn!(
            attempt,
            max_attempts,
            "Attempt {} failed: {}. Retrying in {} ms",
            attempt,
            err,
            delay.as_millis()
        );
    } else {
        error!(attempt, max_attempts, "Attempt {} failed: {}", attempt, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicUsize::new(0);
        let supervisor = RetrySupervisor::new(3, Duration::from_millis(10));

        let result = supervisor
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TokenError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures_with_delay() {
        let supervisor = RetrySupervisor::new(5, Duration::from_millis(20));
        let start = Instant::now();

        let result = supervisor
            .run(|attempt| async move {
                if attempt < 3 {
                    Err(TokenError::Network("node unavailable".into()))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_exhausts_attempts_and_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let supervisor = RetrySupervisor::new(3, Duration::from_millis(5));

        let result: TokenResult<()> = supervisor
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(TokenError::Network(format!("failure {}", attempt))) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            TokenError::Network(msg) => assert_eq!(msg, "failure 3"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let supervisor = RetrySupervisor::new(3, Duration::from_millis(5));

        let result: TokenResult<()> = supervisor
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(TokenError::InsufficientFunds {
                        required: 100_000_000,
                        actual: 50_000_000,
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.unwrap_err().is_insufficient_funds());
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetrySupervisor::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
