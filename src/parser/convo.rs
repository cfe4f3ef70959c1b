use super::types::ConversationScript;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a JSON conversation file
pub fn load_conversation_file(path: &Path) -> Result<Vec<ConversationScript>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_conversations(&content)
        .with_context(|| format!("Invalid conversation file: {}", path.display()))
}

/// Parse JSON conversation content
pub fn parse_conversations(content: &str) -> Result<Vec<ConversationScript>> {
    // A file holds either one script or a list of them.
    let value: serde_json::Value = serde_json::from_str(content)?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

/// Write scripts as a JSON array
pub fn save_conversations(path: &Path, scripts: &[ConversationScript]) -> Result<()> {
    let json = serde_json::to_string_pretty(scripts)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(())
}
