//! Bounded client-side retry with capped exponential backoff.
//!
//! Only errors reporting [`CoreError::is_retryable`] are retried; everything
//! else returns on the first attempt. After the last attempt the last error
//! surfaces unchanged.

use std::future::Future;
use std::time::Duration;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `retry` (0-based): `min(base * 2^retry, max)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retry < self.max_retries => {
                    let delay = self.backoff(&err, retry);
                    tracing::warn!(
                        error = %err,
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Honor a provider's `retry-after` hint, still capped at `max_delay`.
    fn backoff(&self, err: &CoreError, retry: u32) -> Duration {
        let computed = self.delay_for(retry);
        match err {
            CoreError::RateLimited {
                retry_after: Some(hint),
                ..
            } => computed.max(*hint).min(self.max_delay),
            _ => computed,
        }
    }
}
