use super::{classify, Classification, ErrorKind, Severity};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// One classified failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: String,
    pub message: String,
    #[serde(rename = "classifiedType")]
    pub kind: ErrorKind,
    pub severity: Severity,
    pub recoverable: bool,
    pub retryable: bool,
    pub timestamp: DateTime<Utc>,
    pub context: String,
    /// Attempt number when the failure came from a retried operation
    pub attempt: Option<u32>,
}

/// Bookkeeping for one retried operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRecord {
    pub context: String,
    pub attempts: u32,
    pub succeeded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    pub operations: u32,
    pub total_attempts: u32,
    pub succeeded_first_try: u32,
    pub succeeded_after_retry: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub total: usize,
    pub by_kind: BTreeMap<ErrorKind, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub recoverable: usize,
    pub non_recoverable: usize,
}

/// JSON error report written at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ErrorSummary,
    pub errors: Vec<ErrorRecord>,
    pub retry_stats: RetryStats,
    pub recommendations: Vec<String>,
}

/// Append-only log of errors and retried operations for one session
#[derive(Debug, Default)]
pub struct ErrorLog {
    records: Vec<ErrorRecord>,
    retries: Vec<RetryRecord>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify and append an error, returning the stored record
    pub fn record(
        &mut self,
        error: &anyhow::Error,
        context: &str,
        attempt: Option<u32>,
    ) -> &ErrorRecord {
        let Classification {
            kind,
            severity,
            recoverable,
            retryable,
        } = classify(error);

        let record = ErrorRecord {
            id: Uuid::new_v4().to_string(),
            message: format!("{:#}", error),
            kind,
            severity,
            recoverable,
            retryable,
            timestamp: Utc::now(),
            context: context.to_string(),
            attempt,
        };

        log::error!(
            "[{}] {} ({}, severity {}, recoverable {}): {}",
            record.context,
            record.kind,
            record
                .attempt
                .map(|a| format!("attempt {}", a))
                .unwrap_or_else(|| "no retry".to_string()),
            record.severity,
            record.recoverable,
            record.message
        );

        self.records.push(record);
        // Just pushed.
        &self.records[self.records.len() - 1]
    }

    pub fn record_retry(&mut self, context: &str, attempts: u32, succeeded: bool) {
        self.retries.push(RetryRecord {
            context: context.to_string(),
            attempts,
            succeeded,
        });
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn retry_records(&self) -> &[RetryRecord] {
        &self.retries
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> ErrorSummary {
        let mut summary = ErrorSummary {
            total: self.records.len(),
            ..Default::default()
        };

        for record in &self.records {
            *summary.by_kind.entry(record.kind).or_insert(0) += 1;
            *summary.by_severity.entry(record.severity).or_insert(0) += 1;
            if record.recoverable {
                summary.recoverable += 1;
            } else {
                summary.non_recoverable += 1;
            }
        }

        summary
    }

    pub fn retry_stats(&self) -> RetryStats {
        self.retries
            .iter()
            .fold(RetryStats::default(), |mut stats, retry| {
                stats.operations += 1;
                stats.total_attempts += retry.attempts;
                match (retry.succeeded, retry.attempts) {
                    (true, 1) => stats.succeeded_first_try += 1,
                    (true, _) => stats.succeeded_after_retry += 1,
                    (false, _) => stats.failed += 1,
                }
                stats
            })
    }

    pub fn recommendations(&self) -> Vec<String> {
        let summary = self.summary();
        let count = |kind: ErrorKind| summary.by_kind.get(&kind).copied().unwrap_or(0);
        let mut out = Vec::new();

        let element = count(ErrorKind::ElementNotFound);
        if element > 0 {
            out.push(format!(
                "{} element lookups failed: check the chat widget selector catalog against the current page",
                element
            ));
        }
        let timeouts = count(ErrorKind::TimeoutError);
        if timeouts > 0 {
            out.push(format!(
                "{} timeouts: raise the reply/wait timeouts or check bot response latency",
                timeouts
            ));
        }
        let network = count(ErrorKind::NetworkError);
        if network > 0 {
            out.push(format!(
                "{} network errors: check connectivity to the chat backend",
                network
            ));
        }
        let assertions = count(ErrorKind::AssertionError);
        if assertions > 0 {
            out.push(format!(
                "{} assertion failures: review the expected bot responses in the conversation scripts",
                assertions
            ));
        }
        let browser = count(ErrorKind::BrowserError);
        if browser > 0 {
            out.push(format!(
                "{} browser errors: check browser and driver stability",
                browser
            ));
        }
        let javascript = count(ErrorKind::JavaScriptError);
        if javascript > 0 {
            out.push(format!(
                "{} JavaScript errors: inspect the page console log captured on failure",
                javascript
            ));
        }

        let critical = summary
            .by_severity
            .get(&Severity::Critical)
            .copied()
            .unwrap_or(0);
        if critical > 0 {
            out.push(format!(
                "{} critical errors: fix these before re-running the suite",
                critical
            ));
        }

        let stats = self.retry_stats();
        if stats.failed > 0 {
            out.push(format!(
                "{} operations exhausted their retries",
                stats.failed
            ));
        }

        if out.is_empty() {
            out.push("No errors recorded".to_string());
        }
        out
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            generated_at: Utc::now(),
            summary: self.summary(),
            errors: self.records.clone(),
            retry_stats: self.retry_stats(),
            recommendations: self.recommendations(),
        }
    }

    pub fn write_report(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.report())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write error report: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;

    #[test]
    fn test_record_classifies_and_appends() {
        let mut log = ErrorLog::new();
        let err = anyhow::anyhow!("Timeout waiting for element");
        let record = log.record(&err, "open widget", Some(2));

        assert_eq!(record.kind, ErrorKind::TimeoutError);
        assert_eq!(record.severity, Severity::High);
        assert_eq!(record.attempt, Some(2));
        assert_eq!(record.context, "open widget");
        assert_eq!(log.records().len(), 1);
    }

    #[test]
    fn test_summary_and_recommendations() {
        let mut log = ErrorLog::new();
        log.record(
            &anyhow::Error::new(HarnessError::element_not_found("#send")),
            "send",
            None,
        );
        log.record(
            &anyhow::Error::new(HarnessError::SessionLost("gone".into())),
            "read",
            None,
        );
        log.record_retry("send", 3, false);
        log.record_retry("open", 2, true);
        log.record_retry("navigate", 1, true);

        let summary = log.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_kind[&ErrorKind::ElementNotFound], 1);
        assert_eq!(summary.by_kind[&ErrorKind::BrowserError], 1);
        assert_eq!(summary.non_recoverable, 1);

        let stats = log.retry_stats();
        assert_eq!(
            stats,
            RetryStats {
                operations: 3,
                total_attempts: 6,
                succeeded_first_try: 1,
                succeeded_after_retry: 1,
                failed: 1,
            }
        );

        let recs = log.recommendations();
        assert!(recs.iter().any(|r| r.contains("selector catalog")));
        assert!(recs.iter().any(|r| r.contains("critical")));
        assert!(recs.iter().any(|r| r.contains("exhausted")));
    }

    #[test]
    fn test_empty_log_recommendation() {
        assert_eq!(ErrorLog::new().recommendations(), vec!["No errors recorded"]);
    }

    #[test]
    fn test_write_report_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error-report.json");
        let mut log = ErrorLog::new();
        log.record(&anyhow::anyhow!("network error"), "reply", Some(1));
        log.write_report(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in ["generatedAt", "summary", "errors", "retryStats", "recommendations"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["errors"][0]["classifiedType"], "NetworkError");
        assert!(value["errors"][0].get("kind").is_none());
        assert_eq!(value["errors"][0]["severity"], "Medium");
    }
}
