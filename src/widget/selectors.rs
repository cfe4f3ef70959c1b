use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which chat widget is under test
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Brand {
    #[default]
    VirginMedia,
    O2,
}

impl Brand {
    /// Help page that hosts the chat widget
    pub fn default_url(&self) -> &'static str {
        match self {
            Brand::VirginMedia => "https://www.virginmedia.com/help/contact-us",
            Brand::O2 => "https://www.o2.co.uk/contactus",
        }
    }

    pub fn catalog(&self) -> SelectorCatalog {
        match self {
            Brand::VirginMedia => SelectorCatalog::virgin_media(),
            Brand::O2 => SelectorCatalog::o2(),
        }
    }
}

impl FromStr for Brand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "virgin-media" | "virginmedia" | "vm" => Ok(Brand::VirginMedia),
            "o2" => Ok(Brand::O2),
            other => anyhow::bail!("Unknown brand: {}", other),
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Brand::VirginMedia => f.write_str("virgin-media"),
            Brand::O2 => f.write_str("o2"),
        }
    }
}

/// Ordered CSS selector candidates for each chat control.
/// The first displayed candidate wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectorCatalog {
    pub launcher: Vec<String>,
    pub input: Vec<String>,
    pub send_button: Vec<String>,
    pub bot_message: Vec<String>,
    pub typing_indicator: Vec<String>,
}

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SelectorCatalog {
    pub fn virgin_media() -> Self {
        Self {
            launcher: list(&[
                "[data-testid='chat-launcher']",
                "#vm-chat-launcher",
                "button[aria-label*='chat' i]",
            ]),
            input: list(&[
                "[data-testid='chat-input']",
                "#vm-chat-input",
                "textarea[aria-label*='message' i]",
            ]),
            send_button: list(&[
                "[data-testid='chat-send']",
                "#vm-chat-send",
                "button[aria-label*='send' i]",
            ]),
            bot_message: list(&[
                "[data-testid='bot-message']",
                ".vm-chat__message--bot",
                ".bot-message",
            ]),
            typing_indicator: list(&[
                "[data-testid='typing-indicator']",
                ".vm-chat__typing",
            ]),
        }
    }

    pub fn o2() -> Self {
        Self {
            launcher: list(&[
                "[data-testid='o2-chat-launcher']",
                "#o2-chat-button",
                "button[aria-label*='chat' i]",
            ]),
            input: list(&[
                "[data-testid='o2-chat-input']",
                "#o2-chat-textarea",
                "textarea[aria-label*='message' i]",
            ]),
            send_button: list(&[
                "[data-testid='o2-chat-send']",
                "#o2-chat-send",
                "button[aria-label*='send' i]",
            ]),
            bot_message: list(&[
                "[data-testid='o2-bot-message']",
                ".o2-chat-message.agent",
                ".bot-message",
            ]),
            typing_indicator: list(&[
                "[data-testid='o2-typing']",
                ".o2-chat-typing",
            ]),
        }
    }

    /// Replace every list the overrides provide
    pub fn with_overrides(mut self, overrides: &SelectorOverrides) -> Self {
        let apply = |target: &mut Vec<String>, source: &Option<Vec<String>>| {
            if let Some(list) = source.as_ref().filter(|l| !l.is_empty()) {
                *target = list.clone();
            }
        };
        apply(&mut self.launcher, &overrides.launcher);
        apply(&mut self.input, &overrides.input);
        apply(&mut self.send_button, &overrides.send_button);
        apply(&mut self.bot_message, &overrides.bot_message);
        apply(&mut self.typing_indicator, &overrides.typing_indicator);
        self
    }
}

/// Per-control selector lists from the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectorOverrides {
    pub launcher: Option<Vec<String>>,
    pub input: Option<Vec<String>>,
    pub send_button: Option<Vec<String>>,
    pub bot_message: Option<Vec<String>>,
    pub typing_indicator: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_parse() {
        assert_eq!("Virgin Media".parse::<Brand>().unwrap(), Brand::VirginMedia);
        assert_eq!("virgin_media".parse::<Brand>().unwrap(), Brand::VirginMedia);
        assert_eq!("O2".parse::<Brand>().unwrap(), Brand::O2);
        assert!("three".parse::<Brand>().is_err());
    }

    #[test]
    fn test_overrides_replace_only_given_lists() {
        let overrides = SelectorOverrides {
            input: Some(vec!["#custom-input".to_string()]),
            send_button: Some(vec![]),
            ..Default::default()
        };
        let catalog = Brand::O2.catalog().with_overrides(&overrides);

        assert_eq!(catalog.input, vec!["#custom-input"]);
        assert_eq!(catalog.send_button, SelectorCatalog::o2().send_button);
        assert_eq!(catalog.launcher, SelectorCatalog::o2().launcher);
    }
}
