// Retry logic for idempotent backend reads
// Writes (start, execute, vote, propose) are never retried: a repeated
// execute request would run another step.

use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::backend::BackendError;
use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn delays(&self) -> Vec<Duration> {
        // ExponentialBackoff yields base^n * factor: 2^n * (base/2) doubles from base
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        let retries = self.max_attempts.saturating_sub(1) as usize;
        let jitter_enabled = self.jitter;

        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .take(retries)
            .map(|delay| if jitter_enabled { jitter(delay) } else { delay })
            .collect()
    }

    /// Run `operation`, retrying transient failures with exponential backoff
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        debug!(
            operation = operation_name,
            max_attempts = self.max_attempts,
            "Starting backend request"
        );

        RetryIf::spawn(
            self.delays(),
            || operation(),
            |error: &BackendError| {
                let retry = error.is_retryable();
                if retry {
                    warn!(operation = operation_name, "Backend request failed (retryable): {}", error);
                }
                retry
            },
        )
        .await
    }
}
