//! Shared retry policy with exponential backoff and jitter.
//!
//! One parametrized policy is reused by filter mutation, model
//! classification, and page fetching. Rate-limit errors follow a
//! longer backoff curve than generic transient errors, and every wait
//! observes the run's cancellation token.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Executes fallible operations under a retry/backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs `op`, retrying retryable failures up to the attempt bound.
    ///
    /// Non-retryable errors and exhausted attempts surface the last
    /// error unchanged. Waits are cancellation-aware; a cancelled token
    /// yields [`Error::Cancelled`] without a further attempt.
    ///
    /// # Errors
    ///
    /// Returns the last operation error, or [`Error::Cancelled`].
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            attempt += 1;

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.config.max_attempts.max(1) {
                return Err(err);
            }

            let base = err
                .suggested_backoff()
                .unwrap_or_else(|| nth_delay(&self.config, attempt, err.is_rate_limit()));
            let delay = apply_jitter(base, self.config.jitter);
            tracing::debug!(
                attempt,
                rate_limited = err.is_rate_limit(),
                delay_ms = delay.as_millis() as u64,
                "retrying after error: {err}"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }
}

/// Backoff delay before retry number `attempt` (1-indexed).
///
/// The schedule is non-decreasing: `base * factor^(attempt-1)`,
/// capped at the configured maximum.
fn nth_delay(config: &RetryConfig, attempt: u32, rate_limited: bool) -> Duration {
    let base_ms = if rate_limited {
        config.rate_limit_base_delay_ms
    } else {
        config.base_delay_ms
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ms = (base_ms as f64 * config.backoff_factor.powi(attempt.saturating_sub(1) as i32))
        .min(config.max_delay_ms as f64) as u64;
    Duration::from_millis(ms)
}

/// Adds up to `jitter` (a fraction of the delay) of random slack.
fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let extra = rand::thread_rng().gen_range(0.0..=jitter);
    delay.mul_f64(1.0 + extra)
}
