//! Error taxonomy for the harness.
//!
//! Failures raised by this crate are typed [`HarnessError`] variants, so their
//! category is known at the throw site. Errors that come from elsewhere (the
//! Playwright driver, I/O, serde) only carry text and are classified with the
//! substring heuristic in [`classify_message`].

pub mod record;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use record::{ErrorLog, ErrorRecord, ErrorReport, RetryRecord, RetryStats};

/// Coarse error category used for logging, reports and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ElementNotFound,
    TimeoutError,
    NetworkError,
    AssertionError,
    BrowserError,
    JavaScriptError,
    UnknownError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ElementNotFound => "ElementNotFound",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::AssertionError => "AssertionError",
            ErrorKind::BrowserError => "BrowserError",
            ErrorKind::JavaScriptError => "JavaScriptError",
            ErrorKind::UnknownError => "UnknownError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        f.write_str(name)
    }
}

/// Result of classifying a single error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub recoverable: bool,
    pub retryable: bool,
}

/// Errors raised by the harness itself
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("timed out after {timeout_ms}ms: {message}")]
    Timeout { message: String, timeout_ms: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("javascript error: {0}")]
    JavaScript(String),

    /// The browser session no longer answers; nothing further can run on it
    #[error("browser session lost: {0}")]
    SessionLost(String),
}

impl HarnessError {
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        HarnessError::ElementNotFound {
            selector: selector.into(),
        }
    }

    pub fn timeout(message: impl Into<String>, timeout_ms: u64) -> Self {
        HarnessError::Timeout {
            message: message.into(),
            timeout_ms,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            HarnessError::Timeout { .. } => ErrorKind::TimeoutError,
            HarnessError::Network(_) => ErrorKind::NetworkError,
            HarnessError::Assertion(_) => ErrorKind::AssertionError,
            HarnessError::Browser(_) | HarnessError::SessionLost(_) => ErrorKind::BrowserError,
            HarnessError::JavaScript(_) => ErrorKind::JavaScriptError,
        }
    }

    pub fn classification(&self) -> Classification {
        let (severity, recoverable, retryable) = match self {
            HarnessError::ElementNotFound { .. } | HarnessError::Timeout { .. } => {
                (Severity::High, true, true)
            }
            HarnessError::Network(_) | HarnessError::Browser(_) | HarnessError::JavaScript(_) => {
                (Severity::Medium, true, true)
            }
            HarnessError::Assertion(_) => (Severity::Low, true, false),
            HarnessError::SessionLost(_) => (Severity::Critical, false, false),
        };

        Classification {
            kind: self.kind(),
            severity,
            recoverable,
            retryable,
        }
    }
}

/// Classify any error.
///
/// A [`HarnessError`] anywhere in the cause chain decides the kind. Anything
/// else falls back to the text heuristic over the full chain message. Either
/// way, "fatal" or "critical" in the message makes it Critical and final.
pub fn classify(error: &anyhow::Error) -> Classification {
    let message = format!("{:#}", error);
    let typed = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<HarnessError>());

    match typed {
        Some(typed) => {
            let mut c = typed.classification();
            if is_fatal(&message.to_lowercase()) {
                c.severity = Severity::Critical;
                c.recoverable = false;
                c.retryable = false;
            }
            c
        }
        None => classify_message(&message),
    }
}

fn is_fatal(lowercase_message: &str) -> bool {
    ["fatal", "critical"]
        .iter()
        .any(|n| lowercase_message.contains(n))
}

/// Classify free text. Rules are checked in order and the first match wins.
pub fn classify_message(message: &str) -> Classification {
    let msg = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

    // "timeout" is checked before "element" so "Timeout waiting for element"
    // stays a timeout.
    let kind = if has(&["timeout", "timed out"]) {
        ErrorKind::TimeoutError
    } else if has(&["element", "selector"]) {
        ErrorKind::ElementNotFound
    } else if has(&["network", "connection"]) {
        ErrorKind::NetworkError
    } else if has(&["assert", "expected"]) {
        ErrorKind::AssertionError
    } else if has(&["browser", "webdriver"]) {
        ErrorKind::BrowserError
    } else if has(&["javascript", "script"]) {
        ErrorKind::JavaScriptError
    } else {
        ErrorKind::UnknownError
    };

    let fatal = is_fatal(&msg);

    let severity = if fatal {
        Severity::Critical
    } else if has(&["timeout", "element not found"]) {
        Severity::High
    } else if has(&["network", "connection"]) {
        Severity::Medium
    } else if has(&["assertion", "expected"]) {
        Severity::Low
    } else {
        Severity::Medium
    };

    // Unclassified errors default to recoverable and retryable.
    Classification {
        kind,
        severity,
        recoverable: !fatal,
        retryable: !fatal && !msg.contains("assertion"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_waiting_for_element() {
        let c = classify_message("Timeout waiting for element");
        assert_eq!(c.kind, ErrorKind::TimeoutError);
        assert_eq!(c.severity, Severity::High);
        assert!(c.recoverable);
        assert!(c.retryable);
    }

    #[test]
    fn test_any_timeout_message_is_high_timeout() {
        for msg in [
            "timeout",
            "Navigation TIMEOUT exceeded",
            "selector timeout while typing",
            "network timeout on connection",
        ] {
            let c = classify_message(msg);
            assert_eq!(c.kind, ErrorKind::TimeoutError, "{}", msg);
            assert_eq!(c.severity, Severity::High, "{}", msg);
            assert!(c.recoverable, "{}", msg);
        }
    }

    #[test]
    fn test_fatal_and_critical_are_never_recoverable() {
        for msg in [
            "fatal: browser crashed",
            "Critical timeout in element lookup",
            "network CRITICAL failure",
            "FATAL",
        ] {
            let c = classify_message(msg);
            assert!(!c.recoverable, "{}", msg);
            assert!(!c.retryable, "{}", msg);
            assert_eq!(c.severity, Severity::Critical, "{}", msg);
        }
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(
            classify_message("no such element: #chat-input").kind,
            ErrorKind::ElementNotFound
        );
        assert_eq!(
            classify_message("invalid selector").kind,
            ErrorKind::ElementNotFound
        );
        assert_eq!(
            classify_message("connection refused").kind,
            ErrorKind::NetworkError
        );
        assert_eq!(
            classify_message("expected 'hello' got 'bye'").kind,
            ErrorKind::AssertionError
        );
        assert_eq!(
            classify_message("webdriver session closed").kind,
            ErrorKind::BrowserError
        );
        assert_eq!(
            classify_message("JavaScript ReferenceError: x is not defined").kind,
            ErrorKind::JavaScriptError
        );
        assert_eq!(
            classify_message("something odd").kind,
            ErrorKind::UnknownError
        );
    }

    #[test]
    fn test_assertion_is_not_retryable() {
        let c = classify_message("assertion failed: reply did not match");
        assert_eq!(c.kind, ErrorKind::AssertionError);
        assert_eq!(c.severity, Severity::Low);
        assert!(c.recoverable);
        assert!(!c.retryable);
    }

    #[test]
    fn test_unknown_defaults_are_permissive() {
        let c = classify_message("weird");
        assert_eq!(c.severity, Severity::Medium);
        assert!(c.recoverable);
        assert!(c.retryable);
    }

    #[test]
    fn test_typed_error_wins_over_text() {
        // The text mentions "timeout" but the variant says assertion.
        let err = anyhow::Error::new(HarnessError::Assertion(
            "expected timeout notice in reply".to_string(),
        ));
        let c = classify(&err);
        assert_eq!(c.kind, ErrorKind::AssertionError);
        assert!(!c.retryable);
    }

    #[test]
    fn test_fatal_text_overrides_typed_errors() {
        let typed = [
            HarnessError::element_not_found("#chat-input (fatal: renderer crashed)"),
            HarnessError::timeout("critical: page never loaded", 30_000),
            HarnessError::Network("fatal connection reset".into()),
            HarnessError::JavaScript("Critical script failure".into()),
            HarnessError::Browser("fatal".into()),
        ];
        for err in typed {
            let kind = err.kind();
            let c = classify(&anyhow::Error::new(err));
            assert_eq!(c.kind, kind);
            assert_eq!(c.severity, Severity::Critical);
            assert!(!c.recoverable);
            assert!(!c.retryable);
        }

        // Wording added by context counts too
        let err = anyhow::Error::new(HarnessError::element_not_found("#send"))
            .context("fatal: chat window vanished");
        assert!(!classify(&err).retryable);
    }

    #[test]
    fn test_typed_error_found_through_context() {
        let err = anyhow::Error::new(HarnessError::SessionLost("target closed".into()))
            .context("Failed to read bot replies");
        let c = classify(&err);
        assert_eq!(c.kind, ErrorKind::BrowserError);
        assert_eq!(c.severity, Severity::Critical);
        assert!(!c.recoverable);
    }

    #[test]
    fn test_untyped_error_uses_chain_text() {
        let err = anyhow::anyhow!("net::ERR_CONNECTION_RESET").context("Failed to navigate");
        assert_eq!(classify(&err).kind, ErrorKind::NetworkError);
    }
}
