//! Browser driver implementation using Playwright
//!
//! Launches a local Chromium/Firefox/WebKit through Playwright and exposes the
//! page through [`BrowserDriver`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::driver::traits::BrowserDriver;
use crate::error::{classify_message, ErrorKind, HarnessError};

/// Installs a console hook so messages can be read back later.
/// Playwright-rust does not expose page console events.
const CONSOLE_HOOK: &str = r#"() => {
    if (window.__harnessConsole) return;
    window.__harnessConsole = [];
    for (const level of ['log', 'info', 'warn', 'error']) {
        const original = console[level].bind(console);
        console[level] = (...args) => {
            window.__harnessConsole.push('[' + level + '] ' + args.map(String).join(' '));
            original(...args);
        };
    }
    window.addEventListener('error', e => window.__harnessConsole.push('[uncaught] ' + e.message));
}"#;

const TEXT_OF: &str = "el => el.value || el.innerText || el.textContent || ''";

/// Playwright wording for a page, context or browser that is gone
const CLOSED_MARKERS: &[&str] = &["has been closed", "target closed", "browser closed"];

/// Wrap a Playwright failure, typed by what its text says.
///
/// Closed or fatal sessions become [`HarnessError::SessionLost`] and timeouts
/// become [`HarnessError::Timeout`]. Anything else stays untyped so
/// [`classify_message`] sees the original text.
fn driver_error(action: String, err: impl std::fmt::Display) -> anyhow::Error {
    let message = format!("{}: {}", action, err);
    let lower = message.to_lowercase();
    let classification = classify_message(&message);

    if !classification.recoverable || CLOSED_MARKERS.iter().any(|m| lower.contains(m)) {
        return HarnessError::SessionLost(message).into();
    }
    match classification.kind {
        ErrorKind::TimeoutError => {
            let timeout_ms = timeout_ms_in(&message).unwrap_or(0);
            HarnessError::timeout(message, timeout_ms).into()
        }
        ErrorKind::BrowserError => HarnessError::Browser(message).into(),
        _ => anyhow::anyhow!(message),
    }
}

/// `30000` from "Timeout 30000ms exceeded."
fn timeout_ms_in(message: &str) -> Option<u64> {
    let re = regex::Regex::new(r"(?i)timeout\s+(\d+)\s*ms").ok()?;
    re.captures(message)?.get(1)?.as_str().parse().ok()
}

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "firefox" => BrowserType::Firefox,
            "webkit" | "safari" => BrowserType::Webkit,
            _ => BrowserType::Chromium,
        }
    }
}

/// Browser driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            browser_type: BrowserType::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

/// Browser driver backed by Playwright
pub struct PlaywrightDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Browser>,
    #[allow(dead_code)]
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    config: WebDriverConfig,
}

impl PlaywrightDriver {
    /// Launch a browser and open a fresh page
    pub async fn launch(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser_type {
            BrowserType::Chromium => launch_chromium_browser(&playwright.chromium(), &config).await?,
            BrowserType::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;

        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;

        log::info!(
            "Launched {:?} (headless: {}, viewport {}x{})",
            config.browser_type,
            config.headless,
            config.viewport_width,
            config.viewport_height
        );

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            config,
        })
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    fn browser_name(&self) -> &str {
        match self.config.browser_type {
            BrowserType::Chromium => "chromium",
            BrowserType::Firefox => "firefox",
            BrowserType::Webkit => "webkit",
        }
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;

        page.goto_builder(url)
            .goto()
            .await
            .map_err(|e| driver_error(format!("Failed to navigate to {}", url), e))?;

        // Best effort; some pages forbid script injection until load.
        if let Err(e) = page.evaluate::<(), ()>(CONSOLE_HOOK, ()).await {
            log::debug!("Console hook not installed: {}", e);
        }
        Ok(())
    }

    async fn is_displayed(&self, selector: &str) -> Result<bool> {
        let page = self.page.lock().await;
        match page.query_selector(selector).await? {
            Some(el) => Ok(el.is_visible().await?),
            None => Ok(false),
        }
    }

    async fn get_text(&self, selector: &str) -> Result<String> {
        let page = self.page.lock().await;
        if page.query_selector(selector).await?.is_none() {
            return Err(HarnessError::element_not_found(selector).into());
        }

        let text: String = page
            .evaluate_on_selector::<String, _>(selector, TEXT_OF, None::<String>)
            .await?;
        Ok(text.trim().to_string())
    }

    async fn get_texts(&self, selector: &str) -> Result<Vec<String>> {
        let page = self.page.lock().await;
        let js = "sel => Array.from(document.querySelectorAll(sel)).map(el => (el.innerText || el.textContent || '').trim())";
        let texts: Vec<String> = page.evaluate(js, selector.to_string()).await?;
        Ok(texts)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.click_builder(selector)
            .click()
            .await
            .map_err(|e| driver_error(format!("Failed to click {}", selector), e))?;
        Ok(())
    }

    async fn set_value(&self, selector: &str, text: &str) -> Result<()> {
        let page = self.page.lock().await;
        match page.query_selector(selector).await? {
            Some(el) => {
                el.fill_builder(text).fill().await?;
                Ok(())
            }
            None => Err(HarnessError::element_not_found(selector).into()),
        }
    }

    async fn save_screenshot(&self, path: &Path) -> Result<()> {
        let page = self.page.lock().await;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        page.screenshot_builder()
            .path(path.to_path_buf())
            .screenshot()
            .await?;
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        let page = self.page.lock().await;
        let title: String = page
            .evaluate("() => document.title", ())
            .await
            .map_err(|e| HarnessError::SessionLost(e.to_string()))?;
        Ok(title)
    }

    async fn url(&self) -> Result<String> {
        let page = self.page.lock().await;
        let url: String = page.evaluate("() => window.location.href", ()).await?;
        Ok(url)
    }

    async fn execute(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.page.lock().await;
        let value: serde_json::Value = page
            .evaluate(script, ())
            .await
            .map_err(|e| driver_error("Script evaluation failed".to_string(), e))?;
        Ok(value)
    }

    async fn console_logs(&self) -> Result<Vec<String>> {
        let page = self.page.lock().await;
        let logs: Vec<String> = page
            .evaluate("() => window.__harnessConsole || []", ())
            .await?;
        Ok(logs)
    }

    async fn close(&self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

/// Launch Chromium, preferring an installed browser when Playwright's own is missing
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(std::path::PathBuf::from);

    let system_path = find_system_browser();

    if let Some(ref path) = env_path {
        log::info!("Using browser from env: {}", path.display());
        launcher = launcher.executable(path);
    } else if let Some(ref path) = system_path {
        log::info!("Using discovered browser: {}", path.display());
        launcher = launcher.executable(path);
    } else {
        log::info!("No browser executable found, using Playwright default");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    launcher = launcher.args(&args);

    Ok(launcher.launch().await?)
}

fn find_system_browser() -> Option<std::path::PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    common_paths
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
        .map(|p| p.to_path_buf())
}
