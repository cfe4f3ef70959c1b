use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::parser::{Sender, Turn};

/// Turn execution status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TurnStatus {
    Pending,
    Running,
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

impl TurnStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnStatus::Passed | TurnStatus::Failed { .. } | TurnStatus::Skipped { .. }
        )
    }
}

/// Where a conversation is in its replay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConversationPhase {
    Idle,
    UserTurnSent,
    AwaitingBotReply,
    BotReplyChecked,
    Done,
    Failed,
}

/// State for a single turn
#[derive(Debug, Clone)]
pub struct TurnState {
    pub index: usize,
    pub sender: Sender,
    pub display: String,
    /// The message sent, or the expectation for a bot turn
    pub expected: String,
    /// The bot reply that was matched against the expectation
    pub actual: Option<String>,
    pub status: TurnStatus,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
}

impl TurnState {
    pub fn new(index: usize, turn: &Turn) -> Self {
        Self {
            index,
            sender: turn.sender,
            display: turn.display_name(),
            expected: turn.message_text.clone(),
            actual: None,
            status: TurnStatus::Pending,
            started_at: None,
            duration_ms: None,
        }
    }

    pub fn start(&mut self) {
        self.status = TurnStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn pass(&mut self) {
        self.finish(TurnStatus::Passed);
    }

    pub fn fail(&mut self, error: String) {
        self.finish(TurnStatus::Failed { error });
    }

    pub fn skip(&mut self, reason: String) {
        self.status = TurnStatus::Skipped { reason };
    }

    fn finish(&mut self, status: TurnStatus) {
        self.status = status;
        if let Some(start) = self.started_at {
            self.duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }

    pub fn to_report(&self) -> TurnStateReport {
        TurnStateReport {
            index: self.index,
            sender: self.sender,
            display: self.display.clone(),
            expected: self.expected.clone(),
            actual: self.actual.clone(),
            status: self.status.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStateReport {
    pub index: usize,
    pub sender: Sender,
    pub display: String,
    pub expected: String,
    pub actual: Option<String>,
    pub status: TurnStatus,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConversationStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

/// State for one conversation replay
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub name: String,
    pub source: String,
    pub status: ConversationStatus,
    pub phase: ConversationPhase,
    pub turns: Vec<TurnState>,
    pub current_index: usize,
    pub started_at: Option<Instant>,
    pub total_duration_ms: Option<u64>,
    pub error: Option<String>,
    pub screenshot_path: Option<String>,
}

impl ConversationState {
    pub fn new(name: &str, source: &str, turns: &[Turn]) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            status: ConversationStatus::Pending,
            phase: ConversationPhase::Idle,
            turns: turns
                .iter()
                .enumerate()
                .map(|(i, t)| TurnState::new(i, t))
                .collect(),
            current_index: 0,
            started_at: None,
            total_duration_ms: None,
            error: None,
            screenshot_path: None,
        }
    }

    pub fn start(&mut self) {
        self.status = ConversationStatus::Running;
        self.phase = ConversationPhase::Idle;
        self.started_at = Some(Instant::now());
    }

    pub fn current_turn(&mut self) -> Option<&mut TurnState> {
        self.turns.get_mut(self.current_index)
    }

    pub fn advance(&mut self) -> bool {
        self.current_index += 1;
        self.current_index < self.turns.len()
    }

    /// Mark every pending turn from the current one onwards as skipped
    pub fn skip_remaining(&mut self, reason: &str) {
        for turn in self.turns.iter_mut().skip(self.current_index) {
            if matches!(turn.status, TurnStatus::Pending) {
                turn.skip(reason.to_string());
            }
        }
    }

    pub fn finish(&mut self) {
        if let Some(start) = self.started_at {
            self.total_duration_ms = Some(start.elapsed().as_millis() as u64);
        }

        let failed = self
            .turns
            .iter()
            .any(|t| matches!(t.status, TurnStatus::Failed { .. }));

        if failed || self.error.is_some() {
            self.status = ConversationStatus::Failed;
            self.phase = ConversationPhase::Failed;
        } else {
            self.status = ConversationStatus::Passed;
            self.phase = ConversationPhase::Done;
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ConversationStatus::Passed
    }

    pub fn to_report(&self) -> ConversationStateReport {
        ConversationStateReport {
            name: self.name.clone(),
            source: self.source.clone(),
            status: self.status.clone(),
            phase: self.phase,
            turns: self.turns.iter().map(|t| t.to_report()).collect(),
            total_duration_ms: self.total_duration_ms,
            error: self.error.clone(),
            screenshot_path: self.screenshot_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStateReport {
    pub name: String,
    pub source: String,
    pub status: ConversationStatus,
    pub phase: ConversationPhase,
    pub turns: Vec<TurnStateReport>,
    pub total_duration_ms: Option<u64>,
    pub error: Option<String>,
    pub screenshot_path: Option<String>,
}

/// State for a whole run
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub conversations: Vec<ConversationState>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl SessionState {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            conversations: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn add_conversation(&mut self, conversation: ConversationState) {
        self.conversations.push(conversation);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    pub fn summary(&self) -> TestSummary {
        let mut summary = TestSummary {
            session_id: self.session_id.clone(),
            total_conversations: self.conversations.len() as u32,
            ..Default::default()
        };

        for convo in &self.conversations {
            match convo.status {
                ConversationStatus::Passed => summary.conversations_passed += 1,
                ConversationStatus::Failed => summary.conversations_failed += 1,
                _ => {}
            }
            for turn in &convo.turns {
                summary.total_turns += 1;
                match turn.status {
                    TurnStatus::Passed => summary.turns_passed += 1,
                    TurnStatus::Failed { .. } => summary.turns_failed += 1,
                    TurnStatus::Skipped { .. } => summary.turns_skipped += 1,
                    _ => {}
                }
            }
        }

        summary.total_duration_ms = self.started_at.map(|start| {
            self.finished_at
                .unwrap_or_else(Instant::now)
                .duration_since(start)
                .as_millis() as u64
        });
        summary
    }

    pub fn to_report(&self) -> Vec<ConversationStateReport> {
        self.conversations.iter().map(|c| c.to_report()).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub session_id: String,
    pub total_conversations: u32,
    pub conversations_passed: u32,
    pub conversations_failed: u32,
    pub total_turns: u32,
    pub turns_passed: u32,
    pub turns_failed: u32,
    pub turns_skipped: u32,
    pub total_duration_ms: Option<u64>,
}
