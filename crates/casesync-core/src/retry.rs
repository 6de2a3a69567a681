//! Bounded exponential-backoff execution for rate-limited upstream calls.
//!
//! The executor is shared by every upstream client. Each client's error type
//! decides what counts as a rate-limit signal and whether the response carried
//! an explicit wait hint; the backoff policy itself lives only here.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_WAIT_MS: u64 = 60_000;

/// Classifies an upstream error for the retry executor.
pub trait RateLimitSignal {
    /// Returns true when the upstream asked the caller to slow down.
    fn is_rate_limited(&self) -> bool;

    /// Explicit wait requested by the upstream, if any.
    fn wait_hint(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Retry limits applied to rate-limited calls.
pub struct RetryPolicy {
    /// Retries after the first call; `3` means up to four calls.
    pub max_retries: usize,
    pub base_delay_ms: u64,
    /// Upper bound applied to upstream wait hints.
    pub max_wait_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry_index` (zero-based).
    pub fn wait_for(&self, retry_index: usize, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(Duration::from_millis(self.max_wait_ms.max(1))),
            None => retry_backoff_delay(self.base_delay_ms, retry_index),
        }
    }
}

/// Doubles `base_delay_ms` per retry: 1x, 2x, 4x, ...
pub fn retry_backoff_delay(base_delay_ms: u64, retry_index: usize) -> Duration {
    let exponent = retry_index.min(16) as u32;
    Duration::from_millis(base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent)))
}

#[derive(Debug, Clone, Default)]
/// Runs upstream calls under a [`RetryPolicy`].
pub struct RetryingRequestExecutor {
    policy: RetryPolicy,
}

impl RetryingRequestExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Calls `request` until it succeeds, fails with a non-rate-limit error, or
    /// the retry budget is spent. Waits yield to the runtime instead of
    /// blocking the thread. The last error is returned unchanged.
    pub async fn execute<T, E, F, Fut>(&self, operation: &str, mut request: F) -> Result<T, E>
    where
        E: RateLimitSignal + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry_index = 0_usize;
        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_rate_limited() => return Err(error),
                Err(error) if retry_index >= self.policy.max_retries => {
                    tracing::error!(
                        operation,
                        attempts = retry_index.saturating_add(1),
                        error = %error,
                        "rate limit retries exhausted"
                    );
                    return Err(error);
                }
                Err(error) => {
                    let wait = self.policy.wait_for(retry_index, error.wait_hint());
                    tracing::warn!(
                        operation,
                        attempt = retry_index.saturating_add(1),
                        wait_ms = wait.as_millis() as u64,
                        error = %error,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    retry_index = retry_index.saturating_add(1);
                }
            }
        }
    }
}
