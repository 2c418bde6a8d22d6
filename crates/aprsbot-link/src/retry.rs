//! Exponential backoff for establishing the APRS-IS connection.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::client::{AprsIsLink, LinkConfig};
use crate::error::LinkError;

/// How often and how patiently to retry a failed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Cap for the doubling delay.
    pub max_delay: Duration,
    /// Total attempts including the first. `0` is treated as `1`.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `operation` until it succeeds, fails fatally, or the attempt
    /// budget is spent. Only [retryable](LinkError::is_retryable) errors
    /// are retried; the last error is returned.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, LinkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LinkError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "connection attempt failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// [`AprsIsLink::connect`] with exponential backoff.
///
/// # Errors
///
/// The first fatal error, or the last retryable one once `policy` gives up.
pub async fn connect_with_retry(
    config: &LinkConfig,
    policy: &RetryPolicy,
) -> Result<AprsIsLink, LinkError> {
    let link = policy.run(|| AprsIsLink::connect(config)).await?;
    info!(server = %link.server(), "APRS-IS link ready");
    Ok(link)
}
