//! Bounded retries with exponential backoff
//!
//! Each wrapper runs a fallible call up to `max_retries + 1` times and sleeps
//! `backoff_base * 2^i` on the calling thread after failed attempt `i` when
//! attempts remain. Sleeps block: never call these from a context that
//! cannot tolerate blocking.
//!
//! Backends wrap every single wire request, not whole operations, so a
//! multi-request operation (batch delete, paginated list) can stop part way.

use crate::config::RetryConfig;
use crate::{Error, Result};
use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

/// Retry `op` on any failure, returning the last error once attempts run out
pub fn retry<T, E, F>(max_retries: u32, backoff_base: Duration, op: F) -> std::result::Result<T, E>
where
    E: Display,
    F: FnMut() -> std::result::Result<T, E>,
{
    retry_if(max_retries, backoff_base, |_| true, op)
}

/// Retry `op` while `should_retry` accepts the failure
pub fn retry_if<T, E, F, P>(
    max_retries: u32,
    backoff_base: Duration,
    mut should_retry: P,
    mut op: F,
) -> std::result::Result<T, E>
where
    E: Display,
    F: FnMut() -> std::result::Result<T, E>,
    P: FnMut(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_retries || !should_retry(&err) {
                    return Err(err);
                }
                warn!(
                    attempt = attempt + 1,
                    max_retries,
                    error = %err,
                    "retrying after failure"
                );
                std::thread::sleep(backoff_delay(backoff_base, attempt));
                attempt += 1;
            }
        }
    }
}

/// Delay before retry number `attempt` (0-based)
pub fn backoff_delay(backoff_base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    backoff_base.saturating_mul(factor)
}

/// Retry settings a backend applies to each of its wire calls
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        RetryPolicy {
            max_retries,
            backoff_base,
        }
    }

    /// Single attempt, no sleeping
    pub fn none() -> Self {
        RetryPolicy::new(0, Duration::ZERO)
    }

    /// Run one wire call, retrying only transient failures
    pub fn run<T, F>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        retry_if(self.max_retries, self.backoff_base, Error::is_transient, op).map_err(|err| {
            if err.is_transient() {
                warn!(operation, max_retries = self.max_retries, error = %err, "giving up");
            }
            err
        })
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(config.max_retries, Duration::from_millis(config.backoff_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}
