use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::parser::{load_scenarios, Scenario};

/// Canned customer messages for exploratory runs
const CHAT_MESSAGES: &[&str] = &[
    "Hi, I need some help with my account",
    "My broadband keeps dropping out",
    "Can I upgrade my phone?",
    "Why is my bill higher this month?",
    "How do I set up my new router?",
    "I'd like to talk to someone about cancelling",
    "Is there an outage in my area?",
    "How do I change my payment date?",
];

/// A generated customer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub account_number: String,
}

impl TestUser {
    pub fn generate() -> Self {
        use fake::faker::internet::en::SafeEmail;
        use fake::faker::name::en::Name;
        use fake::faker::phone_number::en::PhoneNumber;
        use fake::Fake;

        let mut rng = rand::thread_rng();
        Self {
            name: Name().fake(),
            email: SafeEmail().fake(),
            phone: PhoneNumber().fake(),
            account_number: format!("{:010}", rng.gen_range(0..10_000_000_000u64)),
        }
    }
}

pub fn random_message() -> &'static str {
    CHAT_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(CHAT_MESSAGES[0])
}

/// Loads fixture files relative to a data directory, reading each file once
#[derive(Debug, Default)]
pub struct TestDataManager {
    base_dir: PathBuf,
    json_cache: HashMap<PathBuf, serde_json::Value>,
    scenario_cache: HashMap<PathBuf, Vec<Scenario>>,
}

impl TestDataManager {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn load_json(&mut self, file: &str) -> Result<&serde_json::Value> {
        let path = self.resolve(file);
        if !self.json_cache.contains_key(&path) {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read test data {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?;
            log::debug!("Loaded test data {}", path.display());
            self.json_cache.insert(path.clone(), value);
        }
        self.json_cache
            .get(&path)
            .with_context(|| format!("Test data {} missing from cache", path.display()))
    }

    /// Load a JSON fixture into a typed value
    pub fn load_json_as<T: DeserializeOwned>(&mut self, file: &str) -> Result<T> {
        let value = self.load_json(file)?.clone();
        serde_json::from_value(value).with_context(|| format!("Unexpected shape in {}", file))
    }

    pub fn load_scenarios(&mut self, file: &str) -> Result<&[Scenario]> {
        let path = self.resolve(file);
        if !self.scenario_cache.contains_key(&path) {
            let scenarios = load_scenarios(&path)?;
            self.scenario_cache.insert(path.clone(), scenarios);
        }
        Ok(self
            .scenario_cache
            .get(&path)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    pub fn clear_cache(&mut self) {
        self.json_cache.clear();
        self.scenario_cache.clear();
    }
}
