use crate::runner::state::{ConversationStateReport, TestSummary};
use serde::{Deserialize, Serialize};

/// Contents of `results.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub session_id: String,
    pub conversations: Vec<ConversationStateReport>,
    pub summary: TestSummary,
    pub generated_at: String,
}
