use super::state::{ConversationStatus, TestSummary};
use tokio::sync::broadcast;

/// Execution events for real-time console output
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Session events
    SessionStarted {
        session_id: String,
        browser: String,
    },
    SessionFinished {
        summary: TestSummary,
    },

    // Conversation events
    ConversationStarted {
        name: String,
        source: String,
        turn_count: usize,
    },
    ConversationFinished {
        name: String,
        status: ConversationStatus,
        duration_ms: Option<u64>,
    },

    // Turn events
    TurnStarted {
        conversation: String,
        index: usize,
        display: String,
    },
    TurnPassed {
        conversation: String,
        index: usize,
        duration_ms: u64,
    },
    TurnFailed {
        conversation: String,
        index: usize,
        error: String,
        duration_ms: u64,
    },
    TurnSkipped {
        conversation: String,
        index: usize,
        reason: String,
    },

    Log {
        message: String,
    },
}

/// Broadcasts events to any number of listeners
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

/// Prints events as they arrive
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        // Hidden target when piped, so no escape codes end up in logs
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut turn_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("Console listener skipped {} events", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::SessionStarted {
                    session_id,
                    browser,
                } => {
                    multi
                        .println(format!(
                            "\n{} Chat session started: {} ({})",
                            "▶".green().bold(),
                            session_id.cyan(),
                            browser
                        ))
                        .ok();
                }

                TestEvent::SessionFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

                    println!("\n{} Chat session finished", "■".blue().bold());
                    println!(
                        "  Conversations: {} total, {} passed, {} failed",
                        summary.total_conversations,
                        summary.conversations_passed.to_string().green(),
                        summary.conversations_failed.to_string().red()
                    );
                    println!(
                        "  Turns: {} passed, {} failed, {} skipped",
                        summary.turns_passed.to_string().green(),
                        summary.turns_failed.to_string().red(),
                        summary.turns_skipped.to_string().yellow()
                    );
                    if let Some(duration) = summary.total_duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                }

                TestEvent::ConversationStarted {
                    name, turn_count, ..
                } => {
                    println!(
                        "\n  {} Conversation: {} ({} turns)",
                        "→".blue(),
                        name.white().bold(),
                        turn_count
                    );
                }

                TestEvent::ConversationFinished {
                    name,
                    status,
                    duration_ms,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    let status_str = match status {
                        ConversationStatus::Passed => "PASSED".green().bold(),
                        ConversationStatus::Failed => "FAILED".red().bold(),
                        _ => "UNKNOWN".white().bold(),
                    };
                    println!("  {} Conversation {} [{}]", "←".blue(), name, status_str);
                    if let Some(duration) = duration_ms {
                        println!("    Duration: {}ms", duration);
                    }
                }

                TestEvent::TurnStarted { index, display, .. } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    turn_text = format!("[{}] {}... ", index, display.dimmed());
                    pb.set_message(turn_text.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                TestEvent::TurnPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                    }
                    println!("    {} {}({}ms)", "✓".green(), turn_text, duration_ms);
                }

                TestEvent::TurnFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                    }
                    println!("    {} {}({}ms)", "✗".red(), turn_text, duration_ms);
                    println!("      {}", error.red());
                }

                TestEvent::TurnSkipped { index, reason, .. } => {
                    println!("    {} [{}] ({})", "○".yellow(), index, reason.dimmed());
                }

                TestEvent::Log { message } => {
                    multi.println(format!("      {}", message)).ok();
                }
            }
        }
    }
}
