//! Read-only views over the archive: chat listing, counts, users, text ranges.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::warn;

use crate::keeper::database::{Database, StoreError};
use crate::keeper::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub chat_id: i64,
    /// Empty when no title is known.
    pub title: String,
}

pub struct Aggregator {
    database: Arc<Database>,
    transport: Arc<dyn Transport>,
    live_titles: bool,
}

impl Aggregator {
    pub fn new(database: Arc<Database>, transport: Arc<dyn Transport>, live_titles: bool) -> Self {
        Self {
            database,
            transport,
            live_titles,
        }
    }

    /// Every chat ever archived, however stale.
    ///
    /// With live titles enabled each chat is looked up on Telegram; a failed
    /// lookup falls back to the last archived title (or blank) for that chat only.
    pub async fn list_chats(&self) -> Result<Vec<ChatEntry>, StoreError> {
        let chats = self.database.chats()?;
        let mut entries = Vec::with_capacity(chats.len());

        for (chat_id, stored_title) in chats {
            let title = if self.live_titles {
                match self.transport.chat_title(chat_id).await {
                    Ok(Some(title)) => Some(title),
                    Ok(None) => stored_title,
                    Err(e) => {
                        warn!("Title lookup for chat {chat_id} failed: {e}");
                        stored_title
                    }
                }
            } else {
                stored_title
            };
            entries.push(ChatEntry {
                chat_id,
                title: title.unwrap_or_default(),
            });
        }

        Ok(entries)
    }

    /// Message count per chat.
    pub fn chat_stats(&self) -> Result<Vec<(i64, u64)>, StoreError> {
        self.database.message_counts()
    }

    pub fn list_users(&self) -> Result<Vec<i64>, StoreError> {
        self.database.user_ids()
    }

    /// Non-empty texts of `chat_id` sent between two calendar dates, both inclusive.
    pub fn extract_range(
        &self,
        chat_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, StoreError> {
        let (from, to) = day_bounds(start, end);
        self.database.texts_between(chat_id, from, to)
    }
}

/// First second of `start` through last second of `end`, in UTC.
pub fn day_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = start.and_time(NaiveTime::MIN).and_utc();
    let end_midnight = end.and_time(NaiveTime::MIN).and_utc();
    let to = end_midnight
        .checked_add_signed(Duration::seconds(86_399))
        .unwrap_or(end_midnight);
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_day_bounds_cover_whole_end_day() {
        let (from, to) = day_bounds(date("2024-01-01"), date("2024-01-31"));
        assert_eq!(from.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2024-01-31T23:59:59+00:00");
    }

    #[test]
    fn test_day_bounds_single_day() {
        let (from, to) = day_bounds(date("2024-02-29"), date("2024-02-29"));
        assert_eq!((to - from).num_seconds(), 86_399);
    }
}
