//! Retry-with-classification executor.

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::ErrorLog;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// `delay * factor^(n-1)` before retry n, capped at `max_delay_ms`.
    /// With `jitter`, the delay is drawn uniformly from its upper half.
    #[serde(rename_all = "camelCase")]
    Exponential {
        factor: f64,
        max_delay_ms: u64,
        jitter: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub delay_ms: u64,
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => Duration::from_millis(self.delay_ms),
            Backoff::Exponential {
                factor,
                max_delay_ms,
                jitter,
            } => {
                let exp = attempt.saturating_sub(1).min(32) as i32;
                let raw = self.delay_ms as f64 * factor.max(1.0).powi(exp);
                let capped = raw.min(max_delay_ms as f64).max(0.0) as u64;
                let millis = if jitter && capped > 1 {
                    rand::thread_rng().gen_range(capped / 2..=capped)
                } else {
                    capped
                };
                Duration::from_millis(millis)
            }
        }
    }
}

/// Run `action` until it succeeds, the attempts run out, or a failure is
/// classified as not retryable.
///
/// Each failure is classified and appended to `errors`, and each call adds
/// one retry record with the number of attempts it took. The error returned on
/// failure is the one raised by the last attempt, unchanged.
pub async fn execute_with_retry<T, F, Fut>(
    errors: &mut ErrorLog,
    label: &str,
    policy: &RetryPolicy,
    mut action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        log::info!("[{}] attempt {}/{}", label, attempt, max_attempts);

        let error = match action().await {
            Ok(value) => {
                log::info!("[{}] attempt {} succeeded", label, attempt);
                errors.record_retry(label, attempt, true);
                return Ok(value);
            }
            Err(e) => e,
        };

        let retryable = errors.record(&error, label, Some(attempt)).retryable;

        if attempt >= max_attempts {
            log::warn!(
                "[{}] giving up after {} attempts: {:#}",
                label,
                attempt,
                error
            );
            errors.record_retry(label, attempt, false);
            return Err(error);
        }

        if !retryable {
            log::warn!("[{}] not retryable, giving up: {:#}", label, error);
            errors.record_retry(label, attempt, false);
            return Err(error);
        }

        let delay = policy.delay_after(attempt);
        log::warn!(
            "[{}] attempt {} failed, retrying in {}ms: {:#}",
            label,
            attempt,
            delay.as_millis(),
            error
        );
        tokio::time::sleep(delay).await;
    }
}
