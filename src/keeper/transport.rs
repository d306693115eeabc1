//! Outbound chat operations the core depends on.

use async_trait::async_trait;

/// A button that sends `data` back as a callback when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn callback(label: &str, data: &str) -> Self {
        Self {
            label: label.to_string(),
            data: data.to_string(),
        }
    }
}

/// Inline keyboard, row by row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

/// Chat transport. Implemented over teloxide in production and by fakes in tests.
///
/// Errors are human-readable strings; implementations log them before returning.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message, returning its ID.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<i64, String>;

    /// Replace the text of a message the bot sent earlier.
    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), String>;

    /// Pin a message without notifying members.
    async fn pin_message(&self, chat_id: i64, message_id: i64) -> Result<(), String>;

    /// Current title of a chat, `None` if it has none.
    async fn chat_title(&self, chat_id: i64) -> Result<Option<String>, String>;

    /// Stop the loading indicator on the caller's client.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), String>;
}
