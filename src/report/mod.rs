pub mod json;
pub mod types;

pub use types::TestResults;

use anyhow::Result;
use crate::runner::state::ConversationStatus;
use colored::Colorize;
use std::path::Path;

/// Print the summary of a saved `results.json`
pub fn print_summary(results_path: &Path) -> Result<()> {
    let results = json::read(results_path)?;
    let summary = &results.summary;

    println!(
        "Session {} ({})",
        results.session_id.cyan(),
        results.generated_at
    );
    for convo in &results.conversations {
        let status = match convo.status {
            ConversationStatus::Passed => "PASSED".green(),
            _ => "FAILED".red(),
        };
        println!("  [{}] {} ({})", status, convo.name, convo.source);
        if let Some(error) = &convo.error {
            println!("      {}", error.dimmed());
        }
    }
    println!(
        "  {} passed, {} failed of {} conversations",
        summary.conversations_passed.to_string().green(),
        summary.conversations_failed.to_string().red(),
        summary.total_conversations
    );
    Ok(())
}
