use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;

use super::context::SessionContext;
use super::conversation::{ConversationOptions, ConversationRunner};
use super::events::{EventEmitter, TestEvent};
use super::state::{ConversationState, SessionState, TestSummary};
use crate::driver::BrowserDriver;
use crate::parser::ConversationScript;
use crate::report::{self, TestResults};
use crate::widget::ChatWidget;

/// A conversation queued for execution
#[derive(Debug, Clone)]
pub struct PlannedConversation {
    pub script: ConversationScript,
    /// Suite the conversation belongs to, usually the file stem
    pub suite: String,
    /// File the conversation came from
    pub source: String,
    /// Overrides the default reply timeout
    pub reply_timeout: Option<Duration>,
}

/// Runs planned conversations against one browser session
pub struct SuiteExecutor {
    driver: Arc<dyn BrowserDriver>,
    widget: Arc<dyn ChatWidget>,
    context: SessionContext,
    session: SessionState,
    emitter: EventEmitter,
    options: ConversationOptions,
    continue_on_failure: bool,
}

impl SuiteExecutor {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        widget: Arc<dyn ChatWidget>,
        context: SessionContext,
        emitter: EventEmitter,
        options: ConversationOptions,
        continue_on_failure: bool,
    ) -> Self {
        let session = SessionState::new(&context.session_id);
        Self {
            driver,
            widget,
            context,
            session,
            emitter,
            options,
            continue_on_failure,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Subscribe to execution events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TestEvent> {
        self.emitter.subscribe()
    }

    /// Run conversations in order.
    ///
    /// Stops after the first failed conversation unless `continue_on_failure`
    /// is set.
    pub async fn run_all(&mut self, planned: &[PlannedConversation]) {
        self.session.start();
        self.emitter.emit(TestEvent::SessionStarted {
            session_id: self.session.session_id.clone(),
            browser: self.driver.browser_name().to_string(),
        });

        for (i, item) in planned.iter().enumerate() {
            let passed = self.run_conversation(item).await;
            if !passed && !self.continue_on_failure {
                let remaining = planned.len() - i - 1;
                if remaining > 0 {
                    self.emitter.emit(TestEvent::Log {
                        message: format!(
                            "{} Stopping: {} conversation(s) not run",
                            "⚠".yellow(),
                            remaining
                        ),
                    });
                }
                break;
            }
        }
    }

    /// Open the widget and replay one conversation. Returns whether it passed.
    pub async fn run_conversation(&mut self, item: &PlannedConversation) -> bool {
        let name = item.script.name().to_string();
        let widget = self.widget.clone();
        let opened = self
            .context
            .retry(&format!("{}: open chat widget", name), || {
                let widget = widget.clone();
                async move { widget.open().await }
            })
            .await;

        let (mut state, error) = match opened {
            Ok(()) => {
                let mut options = self.options;
                if let Some(timeout) = item.reply_timeout {
                    options.reply_timeout = timeout;
                }
                let outcome = ConversationRunner::new(self.widget.as_ref(), &self.emitter)
                    .with_options(options)
                    .run(&mut self.context, &item.script, &item.source)
                    .await;
                if let Some(e) = &outcome.error {
                    self.context.record_failure(&item.suite, &name, e);
                }
                (outcome.state, outcome.error)
            }
            // Already in the error log through the retry loop
            Err(e) => {
                let mut state = ConversationState::new(&name, &item.source, item.script.turns());
                state.start();
                let message = format!("Chat widget did not open: {:#}", e);
                state.error = Some(message.clone());
                state.skip_remaining("chat widget did not open");
                state.finish();
                self.emitter.emit(TestEvent::ConversationFinished {
                    name: name.clone(),
                    status: state.status.clone(),
                    duration_ms: state.total_duration_ms,
                });
                (state, Some(e))
            }
        };

        let passed = error.is_none();
        if error.is_some() {
            let capture = self
                .context
                .capture_failure(self.driver.as_ref(), &item.suite, &name)
                .await;
            if let Some(path) = capture.screenshot {
                self.emitter.emit(TestEvent::Log {
                    message: format!("{} Saved screenshot: {}", "📸".green(), path.display()),
                });
                state.screenshot_path = Some(path.display().to_string());
            }
            if let Some(path) = capture.console_log {
                self.emitter.emit(TestEvent::Log {
                    message: format!("{} Saved console log: {}", "📋".green(), path.display()),
                });
            }
        }

        self.session.add_conversation(state);
        passed
    }

    /// Write `results.json`, `error-report.json` and `screenshot-report.json`
    pub async fn finish(&mut self) -> Result<TestSummary> {
        self.session.finish();
        let summary = self.session.summary();

        self.emitter.emit(TestEvent::SessionFinished {
            summary: summary.clone(),
        });

        let results = TestResults {
            session_id: self.session.session_id.clone(),
            conversations: self.session.to_report(),
            summary: summary.clone(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let results_path = self.context.output_path("results.json");
        report::json::write(&results, &results_path)?;

        let error_path = self.context.output_path("error-report.json");
        self.context.errors.write_report(&error_path)?;

        let screenshot_path = self.context.output_path("screenshot-report.json");
        self.context.screenshots.write_report(&screenshot_path)?;

        log::info!(
            "Reports written to {} ({}, {}, {})",
            self.context.output_dir.display(),
            results_path.display(),
            error_path.display(),
            screenshot_path.display()
        );

        Ok(summary)
    }
}
