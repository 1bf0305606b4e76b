//! Bounded exponential backoff for idempotent network operations.
//!
//! Uploads and downloads fail transiently under load (HTTP 429/5xx, connection
//! resets). [`RetryPolicy::retry`] repeats such an operation with a doubling
//! delay (`initial_backoff * 2^attempt`, capped at `max_backoff`) until it
//! succeeds, returns a permanent error, reaches `max_retries`, or would exceed
//! `max_elapsed` in total.
//!
//! Only idempotent work belongs here. Page creation is never wrapped: a retried
//! `createPage` could publish the same article twice.

use crate::config::ArchiveConfig;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Errors that know whether repeating the operation may succeed.
pub trait Retryable {
    /// `true` for failures worth retrying (timeouts, 429, 5xx).
    fn is_transient(&self) -> bool;
}

/// Exponential backoff capped by retry count and total elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt. Default: 10.
    pub max_retries: u32,
    /// Upper bound on total time spent, including backoff sleeps. Default: 5 min.
    pub max_elapsed: Duration,
    /// Delay before the first retry. Default: 500 ms.
    pub initial_backoff: Duration,
    /// Ceiling for a single backoff sleep. Default: 30 s.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            max_elapsed: Duration::from_secs(300),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from the archive configuration.
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_elapsed: Duration::from_secs(config.max_elapsed_secs),
            initial_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `operation` until it succeeds or the policy gives up.
    ///
    /// Returns the last error when retries are exhausted, the elapsed budget
    /// would be exceeded by the next sleep, or the error is not transient.
    pub async fn retry<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{}: succeeded after {} retries", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt >= self.max_retries {
                        warn!("{}: giving up after {} retries: {}", label, attempt, e);
                        return Err(e);
                    }
                    attempt += 1;
                    let backoff = self.backoff(attempt);
                    if start.elapsed() + backoff > self.max_elapsed {
                        warn!(
                            "{}: giving up, {:?} elapsed budget exhausted: {}",
                            label, self.max_elapsed, e
                        );
                        return Err(e);
                    }
                    warn!(
                        "{}: retry {}/{} after {:?}: {}",
                        label, attempt, self.max_retries, backoff, e
                    );
                    sleep(backoff).await;
                }
            }
        }
    }
}
