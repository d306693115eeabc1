//! Persistent SQLite store for archived messages, users and checklists.

use crate::keeper::checklist::{Checklist, ChecklistItem, Completion};
use crate::keeper::message::MessageRecord;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// Checklist items column could not be (de)serialized.
    Json(serde_json::Error),
    Poisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "database error: {e}"),
            Self::Json(e) => write!(f, "corrupt checklist items: {e}"),
            Self::Poisoned => write!(f, "database lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Poisoned => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Persistent SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // WAL so stats queries don't wait on the ingestion path
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn)?;

        let (msg_count, user_count) = db.counts()?;
        info!("Loaded database from {:?} ({} messages, {} users)", path, msg_count, user_count);
        Ok(db)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                chat_title TEXT,
                message_id INTEGER NOT NULL,
                sender_id INTEGER,
                timestamp INTEGER NOT NULL,
                text TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS checklists (
                chat_id INTEGER PRIMARY KEY,
                message_id INTEGER NOT NULL,
                items TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_chat_time ON messages(chat_id, timestamp);
        "#)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// (messages, users)
    pub fn counts(&self) -> Result<(usize, usize), StoreError> {
        let conn = self.conn()?;
        let msg_count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok((msg_count as usize, user_count as usize))
    }

    // ==================== ARCHIVE ====================

    /// Append a message and upsert its sender. No deduplication on message ID.
    pub fn insert_message(&self, msg: &MessageRecord) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO messages (chat_id, chat_title, message_id, sender_id, timestamp, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                msg.chat_id,
                msg.chat_title,
                msg.message_id,
                msg.sender_id,
                msg.timestamp.timestamp(),
                msg.text
            ],
        )?;

        if let Some(sender_id) = msg.sender_id {
            tx.execute("INSERT OR IGNORE INTO users (user_id) VALUES (?1)", params![sender_id])?;
        }

        tx.commit()?;
        Ok(())
    }

    // ==================== AGGREGATES ====================

    /// Every chat ever archived with its most recently stored title.
    pub fn chats(&self) -> Result<Vec<(i64, Option<String>)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.chat_id,
                    (SELECT t.chat_title FROM messages t
                     WHERE t.chat_id = m.chat_id AND t.chat_title IS NOT NULL
                     ORDER BY t.timestamp DESC, t.id DESC LIMIT 1)
             FROM messages m
             GROUP BY m.chat_id
             ORDER BY m.chat_id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Message count per chat over the whole archive.
    pub fn message_counts(&self) -> Result<Vec<(i64, u64)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT chat_id, COUNT(*) FROM messages GROUP BY chat_id ORDER BY chat_id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id FROM users ORDER BY user_id")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Non-empty texts of one chat within `[start, end]`, oldest first.
    pub fn texts_between(
        &self,
        chat_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT text FROM messages
             WHERE chat_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3 AND text != ''
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![chat_id, start.timestamp(), end.timestamp()], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ==================== CHECKLISTS ====================

    /// Store a checklist, replacing any previous one for the chat.
    pub fn save_checklist(&self, checklist: &Checklist) -> Result<(), StoreError> {
        let items = serde_json::to_string(&checklist.items)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO checklists (chat_id, message_id, items) VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET message_id = ?2, items = ?3",
            params![checklist.chat_id, checklist.message_id, items],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub fn load_checklist(&self, chat_id: i64) -> Result<Option<Checklist>, StoreError> {
        let conn = self.conn()?;
        load_checklist_with(&conn, chat_id)
    }

    /// Break the archive so every later insert fails.
    #[cfg(test)]
    pub fn drop_messages_table(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch("DROP TABLE messages")?;
        Ok(())
    }

    /// Mark one item done inside a single transaction.
    ///
    /// The read and the write happen under the connection lock, so two
    /// completions for the same chat can never overwrite each other.
    /// Returns the checklist as stored after the call.
    pub fn complete_checklist_item(
        &self,
        chat_id: i64,
        index: i64,
    ) -> Result<(Completion, Option<Checklist>), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let Some(mut checklist) = load_checklist_with(&tx, chat_id)? else {
            return Ok((Completion::NoChecklist, None));
        };

        let outcome = checklist.complete(index);
        if outcome == Completion::Done {
            let items = serde_json::to_string(&checklist.items)?;
            tx.execute(
                "UPDATE checklists SET items = ?2 WHERE chat_id = ?1",
                params![chat_id, items],
            )?;
        }
        tx.commit()?;

        Ok((outcome, Some(checklist)))
    }
}

fn load_checklist_with(conn: &Connection, chat_id: i64) -> Result<Option<Checklist>, StoreError> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT message_id, items FROM checklists WHERE chat_id = ?1",
            params![chat_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((message_id, items)) => {
            let items: Vec<ChecklistItem> = serde_json::from_str(&items)?;
            Ok(Some(Checklist { chat_id, message_id, items }))
        }
        None => Ok(None),
    }
}
