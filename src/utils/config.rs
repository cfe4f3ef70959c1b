use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::runner::retry::{Backoff, RetryPolicy};
use crate::widget::{Brand, SelectorCatalog, SelectorOverrides, WidgetTimeouts};

pub const ENV_BASE_URL: &str = "CHATBOT_BASE_URL";
pub const ENV_HEADLESS: &str = "CHATBOT_HEADLESS";
pub const ENV_BRAND: &str = "CHATBOT_BRAND";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub brand: Brand,

    /// Page hosting the widget. Defaults to the brand's help page.
    pub base_url: Option<String>,

    /// chromium, firefox or webkit
    pub browser: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Default timeout for element waiting (ms)
    pub default_timeout_ms: u64,
    pub page_load_timeout_ms: u64,

    /// How long a bot turn waits for its reply (ms)
    pub reply_timeout_ms: u64,
    pub poll_interval_ms: u64,

    /// Attempts for retried operations, first one included
    pub default_retry_count: u32,

    /// Delay between retries (ms)
    pub retry_delay_ms: u64,
    pub backoff: Backoff,

    /// Keep running conversations after one fails
    pub continue_on_failure: bool,
    pub screenshot_on_failure: bool,
    pub output_dir: PathBuf,

    pub selectors: SelectorOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brand: Brand::VirginMedia,
            base_url: None,
            browser: "chromium".to_string(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            default_timeout_ms: 10_000,
            page_load_timeout_ms: 30_000,
            reply_timeout_ms: 15_000,
            poll_interval_ms: 500,
            default_retry_count: 3,
            retry_delay_ms: 1000,
            backoff: Backoff::Fixed,
            continue_on_failure: true,
            screenshot_on_failure: true,
            output_dir: PathBuf::from("output"),
            selectors: SelectorOverrides::default(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Defaults, overlaid by the YAML file when given, then by the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Apply `CHATBOT_*` overrides using `lookup` to read variables
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.base_url = Some(url);
        }
        if let Some(value) = lookup(ENV_HEADLESS) {
            match parse_bool(&value) {
                Some(headless) => self.headless = headless,
                None => log::warn!("Ignoring {}={}: not a boolean", ENV_HEADLESS, value),
            }
        }
        if let Some(brand) = lookup(ENV_BRAND) {
            self.brand = brand
                .parse()
                .with_context(|| format!("Invalid {}", ENV_BRAND))?;
        }
        Ok(())
    }

    pub fn entry_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.brand.default_url().to_string())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.default_retry_count, self.retry_delay_ms).with_backoff(self.backoff)
    }

    pub fn selector_catalog(&self) -> SelectorCatalog {
        self.brand.catalog().with_overrides(&self.selectors)
    }

    pub fn widget_timeouts(&self) -> WidgetTimeouts {
        WidgetTimeouts {
            page_load_ms: self.page_load_timeout_ms,
            element_ms: self.default_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_retry_count, 3);
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.entry_url(), Brand::VirginMedia.default_url());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatbot.yaml");
        std::fs::write(
            &path,
            "brand: o2\nreplyTimeoutMs: 20000\nselectors:\n  input:\n    - '#custom'\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.brand, Brand::O2);
        assert_eq!(config.reply_timeout_ms, 20_000);
        assert_eq!(config.default_timeout_ms, 10_000);
        assert_eq!(config.selector_catalog().input, vec!["#custom"]);
        assert_eq!(config.selector_catalog().launcher, SelectorCatalog::o2().launcher);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://staging.example.com/help"),
            (ENV_HEADLESS, "false"),
            (ENV_BRAND, "o2"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert!(!config.headless);
        assert_eq!(config.brand, Brand::O2);
        assert_eq!(config.entry_url(), "https://staging.example.com/help");
    }

    #[test]
    fn test_bad_env_values() {
        let mut config = Config::default();
        config
            .apply_env_from(|k| (k == ENV_HEADLESS).then(|| "maybe".to_string()))
            .unwrap();
        assert!(config.headless);

        assert!(config
            .apply_env_from(|k| (k == ENV_BRAND).then(|| "three".to_string()))
            .is_err());
    }
}
