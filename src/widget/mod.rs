pub mod chat;
pub mod selectors;

pub use chat::{SelectorChatWidget, WidgetTimeouts};
pub use selectors::{Brand, SelectorCatalog, SelectorOverrides};

use anyhow::Result;
use async_trait::async_trait;

/// Semantic operations on an embedded chat widget.
///
/// Implementations hide how the widget is located on the page. Callers only
/// see messages.
#[async_trait]
pub trait ChatWidget: Send + Sync {
    /// Load the host page and bring the chat window up
    async fn open(&self) -> Result<()>;

    /// Whether the message input is on screen
    async fn is_open(&self) -> Result<bool>;

    /// Type a message and press send
    async fn send_message(&self, text: &str) -> Result<()>;

    /// Every bot reply currently shown, oldest first
    async fn bot_replies(&self) -> Result<Vec<String>>;

    async fn last_bot_reply(&self) -> Result<Option<String>> {
        Ok(self.bot_replies().await?.pop())
    }

    /// Whether the bot is showing its typing indicator
    async fn is_typing(&self) -> Result<bool>;
}
