use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::selectors::SelectorCatalog;
use super::ChatWidget;
use crate::driver::BrowserDriver;
use crate::error::HarnessError;
use crate::runner::wait::{wait_for_page_load, wait_until, WaitSpec, DEFAULT_POLL_INTERVAL_MS};

/// Timeouts used while opening the widget
#[derive(Debug, Clone, Copy)]
pub struct WidgetTimeouts {
    pub page_load_ms: u64,
    pub element_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WidgetTimeouts {
    fn default() -> Self {
        Self {
            page_load_ms: 30_000,
            element_ms: 10_000,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// [`ChatWidget`] that resolves each control through an ordered selector list
pub struct SelectorChatWidget {
    driver: Arc<dyn BrowserDriver>,
    catalog: SelectorCatalog,
    entry_url: String,
    timeouts: WidgetTimeouts,
}

impl SelectorChatWidget {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        catalog: SelectorCatalog,
        entry_url: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            catalog,
            entry_url: entry_url.into(),
            timeouts: WidgetTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: WidgetTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn catalog(&self) -> &SelectorCatalog {
        &self.catalog
    }

    /// First candidate that is currently displayed
    async fn first_displayed(&self, candidates: &[String]) -> Result<Option<String>> {
        for selector in candidates {
            if self.driver.is_displayed(selector).await? {
                return Ok(Some(selector.clone()));
            }
        }
        Ok(None)
    }

    async fn resolve(&self, candidates: &[String], control: &str) -> Result<String> {
        match self.first_displayed(candidates).await? {
            Some(selector) => {
                log::debug!("Resolved {} -> {}", control, selector);
                Ok(selector)
            }
            None => Err(HarnessError::element_not_found(format!(
                "{} [{}]",
                control,
                candidates.join(", ")
            ))
            .into()),
        }
    }

    /// Poll until any candidate is displayed, then resolve it
    async fn wait_for_control(&self, candidates: &[String], control: &str) -> Result<String> {
        let spec = WaitSpec::new(self.timeouts.element_ms)
            .poll_every(self.timeouts.poll_interval_ms)
            .message(format!("Timed out waiting for {} element", control));
        wait_until(&spec, || async move {
            Ok(self.first_displayed(candidates).await?.is_some())
        })
        .await?;
        self.resolve(candidates, control).await
    }
}

#[async_trait]
impl ChatWidget for SelectorChatWidget {
    async fn open(&self) -> Result<()> {
        log::info!("Opening chat widget at {}", self.entry_url);
        self.driver.navigate(&self.entry_url).await?;

        let load = WaitSpec::new(self.timeouts.page_load_ms)
            .poll_every(self.timeouts.poll_interval_ms)
            .message("Timed out waiting for page load");
        wait_for_page_load(self.driver.as_ref(), &load).await?;

        if !self.is_open().await? {
            let launcher = self
                .wait_for_control(&self.catalog.launcher, "chat launcher")
                .await?;
            self.driver.click(&launcher).await?;
        }

        self.wait_for_control(&self.catalog.input, "chat input")
            .await
            .context("Chat window did not open")?;
        Ok(())
    }

    async fn is_open(&self) -> Result<bool> {
        Ok(self.first_displayed(&self.catalog.input).await?.is_some())
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let input = self.resolve(&self.catalog.input, "chat input").await?;
        self.driver.set_value(&input, text).await?;
        let send = self.resolve(&self.catalog.send_button, "send button").await?;
        self.driver.click(&send).await?;
        log::debug!("Sent message: {}", text);
        Ok(())
    }

    async fn bot_replies(&self) -> Result<Vec<String>> {
        for selector in &self.catalog.bot_message {
            let texts: Vec<String> = self
                .driver
                .get_texts(selector)
                .await?
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !texts.is_empty() {
                return Ok(texts);
            }
        }
        Ok(Vec::new())
    }

    async fn is_typing(&self) -> Result<bool> {
        Ok(self
            .first_displayed(&self.catalog.typing_indicator)
            .await?
            .is_some())
    }
}
