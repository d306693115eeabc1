//! Event shapes the router consumes, independent of the chat SDK.

use chrono::{DateTime, Utc};

/// A message observed in some chat.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Chat ID where this message was sent (negative = group, positive = DM).
    pub chat_id: i64,
    pub chat_title: Option<String>,
    pub message_id: i64,
    /// Absent for channel posts.
    pub sender_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    /// Empty for non-text messages.
    pub text: String,
    pub is_private: bool,
}

impl InboundMessage {
    /// The archived form of this message.
    pub fn to_record(&self) -> MessageRecord {
        MessageRecord {
            chat_id: self.chat_id,
            chat_title: self.chat_title.clone(),
            message_id: self.message_id,
            sender_id: self.sender_id,
            timestamp: self.timestamp,
            text: self.text.clone(),
        }
    }
}

/// An inline keyboard button press.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub callback_id: String,
    pub sender_id: i64,
    /// The message carrying the keyboard, if Telegram still exposes it.
    pub origin: Option<MessageRef>,
    pub data: String,
}

/// Handle to a message the bot can edit later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// One archived chat message. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub chat_id: i64,
    pub chat_title: Option<String>,
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}
