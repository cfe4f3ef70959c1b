//! Assertion helpers that keep pass/fail counts for the session.

use anyhow::Result;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::error::HarnessError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssertionCounts {
    pub passed: u32,
    pub failed: u32,
}

impl AssertionCounts {
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }
}

#[derive(Debug, Default)]
pub struct Assertions {
    counts: AssertionCounts,
}

impl Assertions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> AssertionCounts {
        self.counts
    }

    fn check(&mut self, ok: bool, failure: impl FnOnce() -> String) -> Result<()> {
        if ok {
            self.counts.passed += 1;
            Ok(())
        } else {
            self.counts.failed += 1;
            let message = failure();
            log::debug!("Assertion failed: {}", message);
            Err(HarnessError::Assertion(message).into())
        }
    }

    /// Case-insensitive substring check
    pub fn assert_contains(&mut self, actual: &str, expected: &str) -> Result<()> {
        let ok = actual.to_lowercase().contains(&expected.to_lowercase());
        self.check(ok, || {
            format!("expected \"{}\" to contain \"{}\"", actual, expected)
        })
    }

    /// Case-insensitive regex search. An invalid pattern counts as a failure.
    pub fn assert_matches(&mut self, actual: &str, pattern: &str) -> Result<()> {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => {
                let ok = re.is_match(actual);
                self.check(ok, || format!("expected \"{}\" to match /{}/i", actual, pattern))
            }
            Err(e) => self.check(false, || format!("invalid pattern /{}/: {}", pattern, e)),
        }
    }

    pub fn assert_equals<T: PartialEq + Debug>(&mut self, actual: &T, expected: &T) -> Result<()> {
        let ok = actual == expected;
        self.check(ok, || format!("expected {:?}, got {:?}", expected, actual))
    }

    pub fn assert_not_empty(&mut self, actual: &str, what: &str) -> Result<()> {
        self.check(!actual.trim().is_empty(), || format!("expected {} to be non-empty", what))
    }

    pub fn assert_response_time(&mut self, elapsed: Duration, max: Duration) -> Result<()> {
        self.check(elapsed <= max, || {
            format!(
                "expected response within {}ms, took {}ms",
                max.as_millis(),
                elapsed.as_millis()
            )
        })
    }

    pub fn assert_true(&mut self, condition: bool, message: &str) -> Result<()> {
        self.check(condition, || message.to_string())
    }
}
