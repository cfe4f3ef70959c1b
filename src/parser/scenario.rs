use super::types::Scenario;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

/// Load CSV test scenarios.
///
/// Expected header: `scenario,user_input,expected_response,timeout`. The
/// timeout column may be empty.
pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open data file: {}", path.display()))?;
    read_scenarios(file)
}

pub fn read_scenarios<R: std::io::Read>(reader: R) -> Result<Vec<Scenario>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut scenarios = Vec::new();
    for (row, result) in rdr.deserialize().enumerate() {
        let scenario: Scenario =
            result.with_context(|| format!("Failed to parse CSV record {}", row + 1))?;
        scenarios.push(scenario);
    }
    Ok(scenarios)
}
