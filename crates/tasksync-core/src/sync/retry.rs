//! Exponential backoff for rate-limited calls.
//!
//! A single attempt reports an [`Attempt`]; [`retry_with_backoff`] keeps
//! calling it while it answers `Retryable`, sleeping between attempts.

use std::future::Future;
use std::time::Duration;

use crate::error::SyncError;

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Ok(T),
    /// Transient refusal (rate limit); the reason is kept for the final error.
    Retryable(String),
    Fatal(SyncError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 0..retry {
            delay = delay.saturating_mul(self.multiplier).min(self.max_delay);
        }
        delay
    }

    /// The full sleep schedule, one entry per allowed retry.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|retry| self.delay_for(retry))
    }
}

/// Run `attempt` until it succeeds, fails fatally, or retries run out.
///
/// Exhausting the retries yields `SyncError::RateLimit` with the last reason.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut retry = 0;
    loop {
        match attempt().await {
            Attempt::Ok(value) => return Ok(value),
            Attempt::Fatal(err) => return Err(err),
            Attempt::Retryable(reason) => {
                if retry >= policy.max_retries {
                    tracing::error!(
                        retries = policy.max_retries,
                        "giving up after {} retries: {}",
                        policy.max_retries,
                        reason
                    );
                    return Err(SyncError::RateLimit(reason));
                }
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    attempt = retry + 1,
                    delay_ms = delay.as_millis() as u64,
                    "attempt {} rate limited, retrying in {}ms",
                    retry + 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
        }
    }
}
