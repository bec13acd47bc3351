//! Fixed-backoff retry policy for remote fetches

use crate::{
    constants::{LISTING_FETCH_ATTEMPTS, LISTING_RETRY_BACKOFF_SECS},
    error::ProviderError,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Source of delays between attempts
///
/// Production code sleeps on the tokio timer; tests swap in a sleeper that
/// only records what it was asked to do.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How many times to try a request and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` below 1 is treated as 1
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent
    ///
    /// The closure receives the 1-based attempt number. The backoff is slept
    /// between attempts only, never after the last one. Exhaustion is
    /// reported as `ProviderError::FetchExhausted`.
    pub async fn run<T, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        mut attempt: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;

        for n in 1..=self.max_attempts {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        attempt = n,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Fetch attempt failed"
                    );
                    last_error = Some(e);
                    if n < self.max_attempts {
                        sleeper.sleep(self.backoff).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(ProviderError::FetchExhausted {
            attempts: self.max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            LISTING_FETCH_ATTEMPTS,
            Duration::from_secs(LISTING_RETRY_BACKOFF_SECS),
        )
    }
}
