//! Execution strategy: run a whole transaction, retrying it on transient
//! store failures with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tally_core::posting::PostingError;
use tally_shared::config::PostingConfig;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry policy for posting transactions.
#[derive(Debug, Clone)]
pub struct ExecutionStrategy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the first retry (doubles on each retry).
    pub initial_backoff: Duration,
    /// Cap on the backoff.
    pub max_backoff: Duration,
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self::from_config(&PostingConfig::default())
    }
}

impl ExecutionStrategy {
    /// Builds the policy from configuration.
    #[must_use]
    pub fn from_config(config: &PostingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Backoff to wait after the failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, fails permanently, runs out of
    /// attempts or `cancel` fires. Each call of `operation` must be a whole
    /// transaction. Returns the value and the number of attempts used.
    ///
    /// # Errors
    ///
    /// Returns the last error, or `PostingError::Cancelled`.
    pub async fn run<T, F, Fut>(
        &self,
        context: &'static str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<(T, u32), PostingError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, PostingError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(PostingError::Cancelled);
            }
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(context, attempt, "Operation succeeded after retry");
                    }
                    return Ok((value, attempt));
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let backoff = self.backoff_after(attempt);
                    warn!(
                        context,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(PostingError::Cancelled),
                        () = sleep(backoff) => {}
                    }
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(context, attempts = attempt, error = %e, "Operation failed after max retries");
                    }
                    return Err(e);
                }
            }
        }
    }
}
