//! Poll-until waits.
//!
//! Every wait evaluates a predicate, sleeps for the poll interval, and tries
//! again until the predicate holds or the timeout elapses. Errors raised by the
//! predicate end the wait immediately.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::BrowserDriver;
use crate::error::HarnessError;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Parameters of a single wait
#[derive(Debug, Clone)]
pub struct WaitSpec {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub message: String,
}

impl WaitSpec {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            message: "condition not met".to_string(),
        }
    }

    pub fn poll_every(mut self, interval_ms: u64) -> Self {
        self.poll_interval = Duration::from_millis(interval_ms);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn timeout_error(&self) -> HarnessError {
        HarnessError::timeout(self.message.clone(), self.timeout.as_millis() as u64)
    }
}

/// Poll `predicate` until it returns true.
///
/// # Returns
/// The elapsed time when the predicate first held. On timeout, a
/// [`HarnessError::Timeout`] carrying `spec.message`. The failure is raised
/// no earlier than the timeout and no later than one poll interval after it.
pub async fn wait_until<F, Fut>(spec: &WaitSpec, mut predicate: F) -> Result<Duration>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let interval = spec.poll_interval.max(Duration::from_millis(1));

    loop {
        if predicate().await? {
            return Ok(start.elapsed());
        }

        let elapsed = start.elapsed();
        if elapsed >= spec.timeout {
            log::debug!("Wait timed out after {:?}: {}", elapsed, spec.message);
            return Err(spec.timeout_error().into());
        }

        tokio::time::sleep(interval.min(spec.timeout - elapsed)).await;
    }
}

/// Wait for an element to be displayed
pub async fn wait_for_displayed(
    driver: &dyn BrowserDriver,
    selector: &str,
    spec: &WaitSpec,
) -> Result<Duration> {
    wait_until(spec, || async move { driver.is_displayed(selector).await }).await
}

/// Wait for an element to be hidden or removed
pub async fn wait_for_hidden(
    driver: &dyn BrowserDriver,
    selector: &str,
    spec: &WaitSpec,
) -> Result<Duration> {
    wait_until(spec, || async move { Ok(!driver.is_displayed(selector).await?) }).await
}

/// Wait until `document.readyState` is "complete"
pub async fn wait_for_page_load(driver: &dyn BrowserDriver, spec: &WaitSpec) -> Result<Duration> {
    wait_until(spec, || async move {
        let state = driver.execute("document.readyState").await?;
        Ok(state.as_str() == Some("complete"))
    })
    .await
}

pub async fn wait_for_url_contains(
    driver: &dyn BrowserDriver,
    fragment: &str,
    spec: &WaitSpec,
) -> Result<Duration> {
    wait_until(spec, || async move { Ok(driver.url().await?.contains(fragment)) }).await
}

pub async fn wait_for_title_contains(
    driver: &dyn BrowserDriver,
    fragment: &str,
    spec: &WaitSpec,
) -> Result<Duration> {
    wait_until(spec, || async move { Ok(driver.title().await?.contains(fragment)) }).await
}

/// Wait until an element's text differs from what it is now
///
/// # Returns
/// The new text
pub async fn wait_for_text_change(
    driver: &dyn BrowserDriver,
    selector: &str,
    spec: &WaitSpec,
) -> Result<String> {
    let initial = driver.get_text(selector).await?;
    let initial = initial.as_str();
    wait_until(spec, || async move { Ok(driver.get_text(selector).await? != initial) }).await?;
    driver.get_text(selector).await
}
