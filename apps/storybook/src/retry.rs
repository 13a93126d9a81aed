//! Bounded exponential backoff for network-bound calls.
//!
//! Only errors classified as transient (`BookError::is_transient`) are retried.
//! Sleeps use `tokio::time::sleep`, so a page waiting out its backoff never
//! blocks sibling pages running on the same runtime.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::BookError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failure, before clamping; doubles on each later failure.
    pub base_delay: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Image generation and image download: 3 attempts, 10s–30s backoff.
    pub const fn image() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            min_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Story generation: 3 attempts, 2s–10s backoff.
    pub const fn story() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Delay to wait after the `failed_attempt`-th (1-based) failure.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        let raw = self.base_delay.saturating_mul(1u32 << exponent);
        raw.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Exhaustion is reported as
    /// `GenerationFailed` wrapping the last error; permanent errors are returned as-is.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, BookError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BookError>>,
    {
        let max_attempts = self.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_transient() {
                return Err(err);
            }

            if attempt == max_attempts {
                return Err(BookError::GenerationFailed {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                "{} attempt {}/{} failed ({}), retrying after {}ms...",
                operation,
                attempt,
                max_attempts,
                err,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        unreachable!("retry loop returns on its final attempt")
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::image()
    }
}
