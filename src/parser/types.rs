use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who speaks a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The simulated customer
    Me,
    Bot,
}

/// How a bot turn's `messageText` is compared with the captured reply
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive regular expression search
    #[default]
    Regex,
    /// Case-insensitive substring
    Contains,
    /// Equality after trimming whitespace
    Exact,
}

impl MatchMode {
    fn is_default(&self) -> bool {
        *self == MatchMode::Regex
    }
}

/// A single scripted turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub sender: Sender,
    pub message_text: String,
    #[serde(default, skip_serializing_if = "MatchMode::is_default")]
    pub matching: MatchMode,
}

impl Turn {
    pub fn me(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Me,
            message_text: text.into(),
            matching: MatchMode::Regex,
        }
    }

    pub fn bot(pattern: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            message_text: pattern.into(),
            matching: MatchMode::Regex,
        }
    }

    pub fn bot_with(text: impl Into<String>, matching: MatchMode) -> Self {
        Self {
            sender: Sender::Bot,
            message_text: text.into(),
            matching,
        }
    }

    /// Build the matcher for a bot turn
    pub fn matcher(&self) -> Result<Matcher, regex::Error> {
        Matcher::new(&self.message_text, self.matching)
    }

    pub fn display_name(&self) -> String {
        match self.sender {
            Sender::Me => format!("me: \"{}\"", self.message_text),
            Sender::Bot => match self.matching {
                MatchMode::Regex => format!("bot ~ /{}/i", self.message_text),
                MatchMode::Contains => format!("bot contains \"{}\"", self.message_text),
                MatchMode::Exact => format!("bot == \"{}\"", self.message_text),
            },
        }
    }
}

/// Compiled form of a bot expectation
#[derive(Debug, Clone)]
pub enum Matcher {
    Regex(Regex),
    Contains(String),
    Exact(String),
}

impl Matcher {
    pub fn new(text: &str, mode: MatchMode) -> Result<Self, regex::Error> {
        Ok(match mode {
            MatchMode::Regex => {
                Matcher::Regex(RegexBuilder::new(text).case_insensitive(true).build()?)
            }
            MatchMode::Contains => Matcher::Contains(text.to_lowercase()),
            MatchMode::Exact => Matcher::Exact(text.trim().to_string()),
        })
    }

    pub fn matches(&self, reply: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(reply),
            Matcher::Contains(needle) => reply.to_lowercase().contains(needle.as_str()),
            Matcher::Exact(expected) => reply.trim() == expected,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Regex(re) => write!(f, "/{}/i", re.as_str()),
            Matcher::Contains(s) => write!(f, "contains \"{}\"", s),
            Matcher::Exact(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawScript {
    name: String,
    #[serde(default)]
    convo: Vec<Turn>,
}

/// An ordered, validated conversation script.
///
/// Bot-turn patterns are checked on construction, so a script that exists is
/// a script the runner can replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawScript")]
pub struct ConversationScript {
    name: String,
    convo: Vec<Turn>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("conversation has no name")]
    MissingName,
    #[error("conversation '{0}' has no turns")]
    Empty(String),
    #[error("conversation '{name}' turn {index}: invalid pattern: {source}")]
    InvalidPattern {
        name: String,
        index: usize,
        #[source]
        source: regex::Error,
    },
}

impl ConversationScript {
    pub fn new(name: impl Into<String>, convo: Vec<Turn>) -> Result<Self, ScriptError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ScriptError::MissingName);
        }
        if convo.is_empty() {
            return Err(ScriptError::Empty(name));
        }
        for (index, turn) in convo.iter().enumerate() {
            if turn.sender == Sender::Bot {
                turn.matcher().map_err(|source| ScriptError::InvalidPattern {
                    name: name.clone(),
                    index,
                    source,
                })?;
            }
        }
        Ok(Self { name, convo })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn turns(&self) -> &[Turn] {
        &self.convo
    }

    pub fn bot_turn_count(&self) -> usize {
        self.convo.iter().filter(|t| t.sender == Sender::Bot).count()
    }
}

impl TryFrom<RawScript> for ConversationScript {
    type Error = ScriptError;

    fn try_from(raw: RawScript) -> Result<Self, Self::Error> {
        ConversationScript::new(raw.name, raw.convo)
    }
}

/// One row of a CSV scenario file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub scenario: String,
    pub user_input: String,
    pub expected_response: String,
    /// Reply timeout for this row in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Scenario {
    /// A two-turn script: the user input, then the expected response as a
    /// case-insensitive substring
    pub fn to_script(&self) -> Result<ConversationScript, ScriptError> {
        ConversationScript::new(
            self.scenario.clone(),
            vec![
                Turn::me(self.user_input.clone()),
                Turn::bot_with(self.expected_response.clone(), MatchMode::Contains),
            ],
        )
    }
}
