//! Passive archival of every group message.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::keeper::database::Database;
use crate::keeper::message::MessageRecord;

pub struct Archive {
    database: Arc<Database>,
}

impl Archive {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Append the message and remember its sender.
    ///
    /// Best effort: a failed write is logged and dropped so ingestion keeps going.
    pub fn record(&self, msg: &MessageRecord) {
        match self.database.insert_message(msg) {
            Ok(()) => debug!("Archived msg {} in chat {}", msg.message_id, msg.chat_id),
            Err(e) => warn!("Failed to archive msg {} in chat {}: {e}", msg.message_id, msg.chat_id),
        }
    }
}
