pub mod convo;
pub mod scenario;
pub mod types;

pub use convo::{load_conversation_file, parse_conversations, save_conversations};
pub use scenario::load_scenarios;
pub use types::{ConversationScript, MatchMode, Matcher, Scenario, ScriptError, Sender, Turn};
