use super::types::TestResults;
use anyhow::{Context, Result};
use std::path::Path;

/// Write results as pretty JSON
pub fn write(results: &TestResults, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;
    Ok(())
}

pub fn read(path: &Path) -> Result<TestResults> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid results file: {}", path.display()))
}
