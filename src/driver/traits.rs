use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Capability interface over a live browser session.
///
/// The harness never manages the browser process itself beyond [`close`]. All
/// selectors are CSS selectors; resolving semantic controls to selectors is
/// the job of the widget adapter, not the driver.
///
/// [`close`]: BrowserDriver::close
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Short name of the browser engine (e.g. "chromium")
    fn browser_name(&self) -> &str;

    /// Navigate the current page to a URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Check if an element matching the selector exists and is displayed
    async fn is_displayed(&self, selector: &str) -> Result<bool>;

    /// Get the text content of the first element matching the selector
    ///
    /// # Returns
    /// The text content, or an element-not-found error if nothing matches
    async fn get_text(&self, selector: &str) -> Result<String>;

    /// Get the text content of every element matching the selector, in DOM order
    async fn get_texts(&self, selector: &str) -> Result<Vec<String>>;

    /// Click the first element matching the selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Replace the value of an input element
    async fn set_value(&self, selector: &str, text: &str) -> Result<()>;

    /// Save a PNG screenshot of the page
    async fn save_screenshot(&self, path: &Path) -> Result<()>;

    /// Get the page title. Also used as the session validity probe.
    async fn title(&self) -> Result<String>;

    /// Get the current page URL
    async fn url(&self) -> Result<String>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn execute(&self, script: &str) -> Result<serde_json::Value>;

    /// Browser console messages captured since the last navigation
    async fn console_logs(&self) -> Result<Vec<String>>;

    /// End the browser session
    async fn close(&self) -> Result<()>;
}
