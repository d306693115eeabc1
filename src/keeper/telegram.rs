//! Telegram transport using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tracing::{info, warn};

use crate::keeper::message::{CallbackEvent, InboundMessage, MessageRef};
use crate::keeper::transport::{Keyboard, Transport};

/// Telegram rejects longer message texts. Length is counted in UTF-16 code units.
const MAX_MESSAGE_UNITS: usize = 4096;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<i64, String> {
        let mut request = self.bot.send_message(ChatId(chat_id), fit_message(text));

        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_markup(keyboard));
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), String> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), fit_message(text))
            .await
            .map_err(|e| {
                let msg = format!("Failed to edit message: {e}");
                warn!("{}", msg);
                msg
            })?;

        Ok(())
    }

    async fn pin_message(&self, chat_id: i64, message_id: i64) -> Result<(), String> {
        info!("📌 Pinning message {} in chat {}", message_id, chat_id);

        self.bot
            .pin_chat_message(ChatId(chat_id), MessageId(message_id as i32))
            .disable_notification(true)
            .await
            .map_err(|e| {
                let msg = format!("Failed to pin message: {e}");
                warn!("{}", msg);
                msg
            })?;

        Ok(())
    }

    async fn chat_title(&self, chat_id: i64) -> Result<Option<String>, String> {
        let chat = self
            .bot
            .get_chat(ChatId(chat_id))
            .await
            .map_err(|e| format!("Failed to get chat: {e}"))?;

        Ok(chat.title().map(str::to_string))
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), String> {
        self.bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()))
            .await
            .map_err(|e| format!("Failed to answer callback: {e}"))?;

        Ok(())
    }
}

fn inline_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.into_iter().map(|row| {
        row.into_iter()
            .map(|button| InlineKeyboardButton::callback(button.label, button.data))
            .collect::<Vec<_>>()
    }))
}

/// Cut overly long texts at a char boundary.
fn fit_message(text: &str) -> String {
    if text.encode_utf16().count() <= MAX_MESSAGE_UNITS {
        return text.to_string();
    }

    let budget = MAX_MESSAGE_UNITS - 3;
    let mut used = 0;
    let truncated: String = text
        .chars()
        .take_while(|c| {
            used += c.len_utf16();
            used <= budget
        })
        .collect();
    format!("{}...", truncated)
}

/// Router view of a Telegram message. Captions and media are archived as empty text.
pub fn inbound_message(msg: &Message) -> InboundMessage {
    InboundMessage {
        chat_id: msg.chat.id.0,
        chat_title: msg.chat.title().map(str::to_string),
        message_id: msg.id.0 as i64,
        sender_id: msg.from.as_ref().map(|u| u.id.0 as i64),
        timestamp: msg.date,
        text: msg.text().unwrap_or("").to_string(),
        is_private: msg.chat.is_private(),
    }
}

pub fn callback_event(query: &CallbackQuery) -> CallbackEvent {
    CallbackEvent {
        callback_id: query.id.0.clone(),
        sender_id: query.from.id.0 as i64,
        origin: query.message.as_ref().map(|m| MessageRef {
            chat_id: m.chat().id.0,
            message_id: m.id().0 as i64,
        }),
        data: query.data.clone().unwrap_or_default(),
    }
}
