use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use super::{ServiceError, ServiceResult};
use crate::config::RetryConfig;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How one document's call to an external service is attempted: each
/// attempt is bounded by `timeout`, and transient failures are retried with
/// capped exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
    timeout: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_retries(&self) -> usize {
        self.max_retries
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Delay before the `retry`-th retry (1-based).
    fn backoff(&self, retry: usize) -> Duration {
        let doublings = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Calls `attempt` until it succeeds, fails permanently, or has been
    /// retried `max_retries` times. An attempt that outlives the timeout
    /// counts as a [`ServiceError::Timeout`] failure.
    pub async fn call<T, F, Fut>(
        &self,
        document: &str,
        service: &'static str,
        mut attempt: F,
    ) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let mut retries = 0;

        loop {
            let error = match timeout(self.timeout, attempt()).await {
                Ok(Ok(value)) => {
                    if retries > 0 {
                        info!(document, service, attempts = retries + 1, "Service call recovered");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => e,
                Err(_) => ServiceError::Timeout(self.timeout),
            };

            if !error.is_transient() || retries >= self.max_retries {
                warn!(document, service, attempts = retries + 1, error = %error, "Giving up on service");
                return Err(error);
            }

            retries += 1;
            let delay = self.backoff(retries);
            warn!(
                document,
                service,
                retry = retries,
                max_retries = self.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Service call failed, backing off"
            );
            sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
