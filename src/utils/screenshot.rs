use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::driver::BrowserDriver;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRecord {
    pub path: PathBuf,
    pub suite: String,
    pub test: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub byte_size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotStatistics {
    pub total: usize,
    pub total_bytes: u64,
    pub average_bytes: u64,
    pub by_suite: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotReport {
    pub generated_at: DateTime<Utc>,
    pub statistics: ScreenshotStatistics,
    pub screenshots: Vec<ScreenshotRecord>,
    pub summary: String,
}

/// Captures screenshots under `<root>/<suite>/` and keeps an index of them
#[derive(Debug, Clone)]
pub struct ScreenshotManager {
    root: PathBuf,
    records: Vec<ScreenshotRecord>,
}

/// Keep file names portable
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

impl ScreenshotManager {
    /// `output_dir` is the run's output directory; images go to its `screenshots/`
    pub fn new(output_dir: &Path) -> Self {
        Self {
            root: output_dir.join("screenshots"),
            records: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a new screenshot: `<suite>/<test>_<description>_<timestamp>.png`
    pub fn path_for(&self, suite: &str, test: &str, description: &str) -> PathBuf {
        let dir = self.root.join(sanitize(suite));
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%3f");
        let stem = format!("{}_{}_{}", sanitize(test), sanitize(description), stamp);
        let path = dir.join(format!("{}.png", stem));
        if path.exists() {
            let uuid = Uuid::new_v4().to_string();
            dir.join(format!("{}_{}.png", stem, &uuid[..8]))
        } else {
            path
        }
    }

    pub async fn capture(
        &mut self,
        driver: &dyn BrowserDriver,
        suite: &str,
        test: &str,
        description: &str,
    ) -> Result<&ScreenshotRecord> {
        let path = self.path_for(suite, test, description);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        driver.save_screenshot(&path).await?;
        let byte_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        log::info!("Saved screenshot: {} ({} bytes)", path.display(), byte_size);

        self.records.push(ScreenshotRecord {
            path,
            suite: suite.to_string(),
            test: test.to_string(),
            description: description.to_string(),
            timestamp: Utc::now(),
            byte_size,
        });
        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    pub fn records(&self) -> &[ScreenshotRecord] {
        &self.records
    }

    pub fn for_test(&self, suite: &str, test: &str) -> Vec<&ScreenshotRecord> {
        self.records
            .iter()
            .filter(|r| r.suite == suite && r.test == test)
            .collect()
    }

    pub fn statistics(&self) -> ScreenshotStatistics {
        let total = self.records.len();
        let total_bytes: u64 = self.records.iter().map(|r| r.byte_size).sum();
        let mut by_suite = BTreeMap::new();
        for record in &self.records {
            *by_suite.entry(record.suite.clone()).or_insert(0) += 1;
        }
        ScreenshotStatistics {
            total,
            total_bytes,
            average_bytes: if total > 0 { total_bytes / total as u64 } else { 0 },
            by_suite,
        }
    }

    pub fn report(&self) -> ScreenshotReport {
        let statistics = self.statistics();
        let summary = format!(
            "{} screenshots across {} suites ({} bytes)",
            statistics.total,
            statistics.by_suite.len(),
            statistics.total_bytes
        );
        ScreenshotReport {
            generated_at: Utc::now(),
            statistics,
            screenshots: self.records.clone(),
            summary,
        }
    }

    pub fn write_report(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.report())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write screenshot report to {}", path.display()))?;
        Ok(())
    }
}
