use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::retry::{execute_with_retry, RetryPolicy};
use crate::driver::BrowserDriver;
use crate::error::ErrorLog;
use crate::utils::{Assertions, ScreenshotManager};

/// What was saved after a failure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureCapture {
    pub screenshot: Option<PathBuf>,
    pub console_log: Option<PathBuf>,
}

/// Per-run state shared by every conversation in a session
pub struct SessionContext {
    pub session_id: String,

    /// Output directory for screenshots and reports
    pub output_dir: PathBuf,

    pub errors: ErrorLog,
    pub screenshots: ScreenshotManager,
    pub assertions: Assertions,
    pub retry_policy: RetryPolicy,

    /// Capture a screenshot and console log when a conversation fails
    pub screenshot_on_failure: bool,

    /// Values for `${name}` placeholders in user messages
    pub vars: HashMap<String, String>,
}

impl SessionContext {
    pub fn new(output_dir: &Path, retry_policy: RetryPolicy) -> Result<Self> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;

        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            output_dir: output_dir.to_path_buf(),
            errors: ErrorLog::new(),
            screenshots: ScreenshotManager::new(output_dir),
            assertions: Assertions::new(),
            retry_policy,
            screenshot_on_failure: true,
            vars: HashMap::new(),
        })
    }

    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    pub fn get_var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }

    pub fn set_var(&mut self, name: &str, value: &str) {
        let substituted = self.substitute_vars(value);
        self.vars.insert(name.to_string(), substituted);
    }

    /// Replace `${name}` placeholders. Unknown names are left as they are.
    pub fn substitute_vars(&self, text: &str) -> String {
        let re = match Regex::new(r"\$\{([a-zA-Z0-9_.]+)\}") {
            Ok(re) => re,
            Err(_) => return text.to_string(),
        };
        re.replace_all(text, |caps: &regex::Captures| {
            let key = &caps[1];
            if let Some(val) = self.get_var(key) {
                return val;
            }
            match key {
                "time" => chrono::Local::now().format("%H:%M:%S").to_string(),
                "date" => chrono::Local::now().format("%Y-%m-%d").to_string(),
                "timestamp" => chrono::Utc::now().timestamp().to_string(),
                _ => format!("${{{}}}", key),
            }
        })
        .to_string()
    }

    /// Run `action` under the session's retry policy, recording into its error log
    pub async fn retry<T, F, Fut>(&mut self, label: &str, action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = self.retry_policy.clone();
        execute_with_retry(&mut self.errors, label, &policy, action).await
    }

    /// Log a failed test into the session's error log
    pub fn record_failure(&mut self, suite: &str, test: &str, error: &anyhow::Error) {
        self.errors.record(error, &format!("{}/{}", suite, test), None);
    }

    /// Gather evidence from the browser after a failure.
    ///
    /// The session is probed with `title()` first. Nothing is captured from a
    /// dead session, and capture steps are attempted once each.
    pub async fn capture_failure(
        &mut self,
        driver: &dyn BrowserDriver,
        suite: &str,
        test: &str,
    ) -> FailureCapture {
        let mut capture = FailureCapture::default();
        if !self.screenshot_on_failure {
            return capture;
        }

        if let Err(e) = driver.title().await {
            log::warn!("Browser session is not usable, skipping capture: {:#}", e);
            return capture;
        }

        match self.screenshots.capture(driver, suite, test, "failure").await {
            Ok(record) => capture.screenshot = Some(record.path.clone()),
            Err(e) => log::warn!("Failed to take failure screenshot: {:#}", e),
        }

        match driver.console_logs().await {
            Ok(lines) => {
                let uuid = Uuid::new_v4().to_string();
                let filename = format!(
                    "console_{}_{}_{}.log",
                    sanitize(suite),
                    sanitize(test),
                    &uuid[..8]
                );
                let path = self.output_path(&filename);
                match std::fs::write(&path, lines.join("\n")) {
                    Ok(()) => capture.console_log = Some(path),
                    Err(e) => log::warn!("Failed to save console log: {}", e),
                }
            }
            Err(e) => log::warn!("Failed to read console log: {:#}", e),
        }

        capture
    }
}

fn sanitize(name: &str) -> String {
    name.replace(['/', '\\', ' '], "_")
}
