//! Replays one scripted conversation against a chat widget.

use anyhow::{Context, Result};
use std::time::Duration;

use super::context::SessionContext;
use super::events::{EventEmitter, TestEvent};
use super::state::{ConversationPhase, ConversationState, TurnStatus};
use super::wait::{wait_until, WaitSpec, DEFAULT_POLL_INTERVAL_MS};
use crate::parser::{ConversationScript, Sender, Turn};
use crate::widget::ChatWidget;

#[derive(Debug, Clone, Copy)]
pub struct ConversationOptions {
    /// How long a bot turn waits for its reply
    pub reply_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Final state of a replay and the error that stopped it, if any
#[derive(Debug)]
pub struct ConversationOutcome {
    pub state: ConversationState,
    pub error: Option<anyhow::Error>,
}

impl ConversationOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.state.passed()
    }
}

pub struct ConversationRunner<'a> {
    widget: &'a dyn ChatWidget,
    emitter: &'a EventEmitter,
    options: ConversationOptions,
}

impl<'a> ConversationRunner<'a> {
    pub fn new(widget: &'a dyn ChatWidget, emitter: &'a EventEmitter) -> Self {
        Self {
            widget,
            emitter,
            options: ConversationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConversationOptions) -> Self {
        self.options = options;
        self
    }

    /// Drive every turn in order, stopping at the first failure.
    ///
    /// Turns after a failure are marked skipped and never sent.
    pub async fn run(
        &self,
        ctx: &mut SessionContext,
        script: &ConversationScript,
        source: &str,
    ) -> ConversationOutcome {
        let name = script.name().to_string();
        let mut state = ConversationState::new(&name, source, script.turns());
        state.start();
        self.emitter.emit(TestEvent::ConversationStarted {
            name: name.clone(),
            source: source.to_string(),
            turn_count: script.turns().len(),
        });

        // Bot replies already matched (or on screen before the last user turn)
        let mut consumed = 0usize;
        let mut failure = None;

        for (index, turn) in script.turns().iter().enumerate() {
            state.current_index = index;
            if let Some(turn_state) = state.current_turn() {
                turn_state.start();
            }
            self.emitter.emit(TestEvent::TurnStarted {
                conversation: name.clone(),
                index,
                display: turn.display_name(),
            });

            let result = match turn.sender {
                Sender::Me => self.user_turn(ctx, turn, &mut consumed, &mut state).await,
                Sender::Bot => self.bot_turn(ctx, turn, index, &mut consumed, &mut state).await,
            };

            let turn_state = &mut state.turns[index];
            match result {
                Ok(()) => {
                    turn_state.pass();
                    self.emitter.emit(TestEvent::TurnPassed {
                        conversation: name.clone(),
                        index,
                        duration_ms: turn_state.duration_ms.unwrap_or(0),
                    });
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    turn_state.fail(message.clone());
                    self.emitter.emit(TestEvent::TurnFailed {
                        conversation: name.clone(),
                        index,
                        error: message.clone(),
                        duration_ms: turn_state.duration_ms.unwrap_or(0),
                    });
                    state.error = Some(message);
                    failure = Some(e);
                    break;
                }
            }
        }

        if failure.is_some() {
            state.advance();
            state.skip_remaining("previous turn failed");
            for turn in &state.turns {
                if let TurnStatus::Skipped { reason } = &turn.status {
                    self.emitter.emit(TestEvent::TurnSkipped {
                        conversation: name.clone(),
                        index: turn.index,
                        reason: reason.clone(),
                    });
                }
            }
        }

        state.finish();
        self.emitter.emit(TestEvent::ConversationFinished {
            name,
            status: state.status.clone(),
            duration_ms: state.total_duration_ms,
        });

        ConversationOutcome {
            state,
            error: failure,
        }
    }

    async fn user_turn(
        &self,
        ctx: &SessionContext,
        turn: &Turn,
        consumed: &mut usize,
        state: &mut ConversationState,
    ) -> Result<()> {
        // Anything on screen now is not an answer to this message
        *consumed = self.widget.bot_replies().await?.len();

        let text = ctx.substitute_vars(&turn.message_text);
        self.widget.send_message(&text).await?;
        state.turns[state.current_index].actual = Some(text);
        state.phase = ConversationPhase::UserTurnSent;
        Ok(())
    }

    async fn bot_turn(
        &self,
        ctx: &mut SessionContext,
        turn: &Turn,
        index: usize,
        consumed: &mut usize,
        state: &mut ConversationState,
    ) -> Result<()> {
        state.phase = ConversationPhase::AwaitingBotReply;

        let widget = self.widget;
        let seen = *consumed;
        let spec = WaitSpec::new(self.options.reply_timeout.as_millis() as u64)
            .poll_every(self.options.poll_interval.as_millis() as u64)
            .message(format!("Timed out waiting for bot reply to turn {}", index));
        wait_until(&spec, || async move {
            let replies = widget.bot_replies().await?;
            Ok(replies.len() > seen && !widget.is_typing().await?)
        })
        .await?;

        let replies = self.widget.bot_replies().await?;
        let reply = replies
            .get(seen)
            .cloned()
            .with_context(|| format!("Bot reply {} disappeared before it was read", seen))?;
        *consumed = seen + 1;
        state.turns[index].actual = Some(reply.clone());

        let matcher = turn.matcher()?;
        ctx.assertions.assert_true(
            matcher.matches(&reply),
            &format!("bot reply \"{}\" does not match {}", reply, matcher),
        )?;
        state.phase = ConversationPhase::BotReplyChecked;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::ScriptedDriver;
    use crate::error::{classify, ErrorKind};
    use crate::runner::retry::RetryPolicy;
    use crate::runner::state::ConversationStatus;
    use crate::widget::{Brand, SelectorCatalog, SelectorChatWidget};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn setup(
        responder: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> (Arc<ScriptedDriver>, SelectorChatWidget, SelectorCatalog) {
        let c = Brand::VirginMedia.catalog();
        let driver = Arc::new(
            ScriptedDriver::new()
                .with_element(&c.input[0], true, &[])
                .with_element(&c.send_button[0], true, &[])
                .with_bot(&c.input[0], &c.send_button[0], &c.bot_message[0], responder),
        );
        let widget = SelectorChatWidget::new(driver.clone(), c.clone(), "https://vm.test/help");
        (driver, widget, c)
    }

    fn session(dir: &tempfile::TempDir) -> SessionContext {
        SessionContext::new(dir.path(), RetryPolicy::new(1, 0)).unwrap()
    }

    fn options(timeout_ms: u64) -> ConversationOptions {
        ConversationOptions {
            reply_timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(100),
        }
    }

    fn script(turns: Vec<Turn>) -> ConversationScript {
        ConversationScript::new("test", turns).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_turns_pass() {
        let (_driver, widget, _) = setup(|msg| {
            Some(match msg {
                "hi" => "Hello! How can I help you today?".to_string(),
                _ => "Your latest bill is £42.10".to_string(),
            })
        });
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = session(&dir);
        let emitter = EventEmitter::default();

        let outcome = ConversationRunner::new(&widget, &emitter)
            .with_options(options(2_000))
            .run(
                &mut ctx,
                &script(vec![
                    Turn::me("hi"),
                    Turn::bot("how can i help"),
                    Turn::me("show my bill"),
                    Turn::bot(r"bill is £\d+\.\d{2}"),
                ]),
                "billing.json",
            )
            .await;

        assert!(outcome.passed());
        assert_eq!(outcome.state.status, ConversationStatus::Passed);
        assert_eq!(outcome.state.phase, ConversationPhase::Done);
        assert!(outcome
            .state
            .turns
            .iter()
            .all(|t| t.status == TurnStatus::Passed));
        assert_eq!(ctx.assertions.counts().passed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatch_fails_and_skips_rest() {
        let (driver, widget, c) = setup(|_| Some("Sorry, I didn't catch that".to_string()));
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = session(&dir);
        let emitter = EventEmitter::default();

        let outcome = ConversationRunner::new(&widget, &emitter)
            .with_options(options(2_000))
            .run(
                &mut ctx,
                &script(vec![
                    Turn::me("hi"),
                    Turn::bot("hello"),
                    Turn::me("bill"),
                    Turn::bot("bill"),
                ]),
                "x.json",
            )
            .await;

        let err = outcome.error.as_ref().unwrap();
        assert_eq!(classify(err).kind, ErrorKind::AssertionError);
        assert_eq!(outcome.state.phase, ConversationPhase::Failed);
        assert_eq!(
            outcome.state.turns[1].actual.as_deref(),
            Some("Sorry, I didn't catch that")
        );
        assert!(matches!(outcome.state.turns[1].status, TurnStatus::Failed { .. }));
        assert!(matches!(outcome.state.turns[2].status, TurnStatus::Skipped { .. }));
        assert!(matches!(outcome.state.turns[3].status, TurnStatus::Skipped { .. }));
        // Only the first message was ever sent.
        let sends = driver
            .clicks()
            .iter()
            .filter(|s| **s == c.send_button[0])
            .count();
        assert_eq!(sends, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_reply_times_out() {
        let (_driver, widget, _) = setup(|_| None);
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = session(&dir);
        let emitter = EventEmitter::default();
        let start = Instant::now();

        let outcome = ConversationRunner::new(&widget, &emitter)
            .with_options(options(2_000))
            .run(
                &mut ctx,
                &script(vec![Turn::me("hello?"), Turn::bot(".*")]),
                "x.json",
            )
            .await;

        assert!(start.elapsed() >= Duration::from_millis(2_000));
        assert!(start.elapsed() <= Duration::from_millis(2_100));
        let err = outcome.error.unwrap();
        assert_eq!(classify(&err).kind, ErrorKind::TimeoutError);
        assert_eq!(outcome.state.status, ConversationStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_replies_are_not_matched() {
        let (driver, widget, c) = setup(|_| Some("Hello".to_string()));
        driver.push_text(&c.bot_message[0], "Welcome to Virgin Media");
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = session(&dir);
        let emitter = EventEmitter::default();

        let outcome = ConversationRunner::new(&widget, &emitter)
            .with_options(options(1_000))
            .run(
                &mut ctx,
                &script(vec![Turn::me("hi"), Turn::bot("^hello$")]),
                "x.json",
            )
            .await;

        assert!(outcome.passed(), "{:?}", outcome.error);
        assert_eq!(outcome.state.turns[1].actual.as_deref(), Some("Hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_typing_indicator_to_clear() {
        let (driver, widget, c) = setup(|_| Some("Let me check that".to_string()));
        driver.set_element(&c.typing_indicator[0], true, &[]);
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = session(&dir);
        let emitter = EventEmitter::default();
        let start = Instant::now();

        let clear = {
            let driver = driver.clone();
            let typing = c.typing_indicator[0].clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1_500)).await;
                driver.set_displayed(&typing, false);
            })
        };

        let outcome = ConversationRunner::new(&widget, &emitter)
            .with_options(options(5_000))
            .run(
                &mut ctx,
                &script(vec![Turn::me("outage?"), Turn::bot("check")]),
                "x.json",
            )
            .await;
        clear.await.unwrap();

        assert!(outcome.passed());
        assert!(start.elapsed() >= Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_text_substitutes_vars() {
        let (_driver, widget, _) = setup(|msg| Some(format!("Thanks, {}", msg)));
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = session(&dir);
        ctx.set_var("account", "ACC-991");
        let emitter = EventEmitter::default();

        let outcome = ConversationRunner::new(&widget, &emitter)
            .with_options(options(1_000))
            .run(
                &mut ctx,
                &script(vec![
                    Turn::me("${account}"),
                    Turn::bot_with("ACC-991", crate::parser::MatchMode::Contains),
                ]),
                "x.json",
            )
            .await;

        assert!(outcome.passed());
        assert_eq!(outcome.state.turns[0].actual.as_deref(), Some("ACC-991"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_turn_order() {
        let (_driver, widget, _) = setup(|_| Some("ok".to_string()));
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = session(&dir);
        let (emitter, mut rx) = EventEmitter::new();

        ConversationRunner::new(&widget, &emitter)
            .with_options(options(1_000))
            .run(&mut ctx, &script(vec![Turn::me("a"), Turn::bot("nope")]), "x.json")
            .await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                TestEvent::ConversationStarted { .. } => "start",
                TestEvent::TurnStarted { .. } => "turn",
                TestEvent::TurnPassed { .. } => "pass",
                TestEvent::TurnFailed { .. } => "fail",
                TestEvent::TurnSkipped { .. } => "skip",
                TestEvent::ConversationFinished { .. } => "end",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["start", "turn", "pass", "turn", "fail", "end"]);
    }
}
