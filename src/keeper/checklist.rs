//! Per-chat checklists rendered as a single editable message.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::keeper::database::{Database, StoreError};
use crate::keeper::transport::Transport;

const HEADER: &str = "Checklist:";

/// Separator between tasks in the creation command.
const TASK_DELIMITER: char = ';';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// The active checklist of one chat. Item order never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checklist {
    pub chat_id: i64,
    /// Message displaying the checklist, edited in place on every completion.
    pub message_id: i64,
    pub items: Vec<ChecklistItem>,
}

/// Result of a completion request. Everything except `Done` leaves state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Done,
    AlreadyDone,
    OutOfRange,
    NoChecklist,
}

/// Split "a; ; b" into items, dropping blank entries.
pub fn parse_tasks(raw: &str) -> Vec<ChecklistItem> {
    raw.split(TASK_DELIMITER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| ChecklistItem {
            text: t.to_string(),
            done: false,
        })
        .collect()
}

pub fn render(items: &[ChecklistItem]) -> String {
    let mut lines = vec![HEADER.to_string()];
    for (i, item) in items.iter().enumerate() {
        let mark = if item.done { "[x]" } else { "[ ]" };
        lines.push(format!("{}. {} {}", i + 1, mark, item.text));
    }
    lines.join("\n")
}

impl Checklist {
    #[cfg(test)]
    pub fn new(chat_id: i64, message_id: i64, raw_tasks: &str) -> Self {
        Self {
            chat_id,
            message_id,
            items: parse_tasks(raw_tasks),
        }
    }

    pub fn render(&self) -> String {
        render(&self.items)
    }

    /// Mark the item at 1-based `index` done.
    pub fn complete(&mut self, index: i64) -> Completion {
        if index < 1 || index > self.items.len() as i64 {
            return Completion::OutOfRange;
        }
        let item = &mut self.items[(index - 1) as usize];
        if item.done {
            return Completion::AlreadyDone;
        }
        item.done = true;
        Completion::Done
    }
}

#[derive(Debug)]
pub enum ChecklistError {
    /// Every task entry was blank.
    NoTasks,
    Transport(String),
    Store(StoreError),
}

impl fmt::Display for ChecklistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTasks => write!(f, "checklist has no tasks"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ChecklistError {}

impl From<StoreError> for ChecklistError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// One async mutex per chat. Mutations of different chats never contend.
#[derive(Default)]
pub struct ChatLocks {
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatLocks {
    pub fn for_chat(&self, chat_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(chat_id).or_default().clone()
    }
}

/// Creates checklists and applies completions, serialized per chat.
///
/// The store update and the in-place edit of the rendered message both
/// happen while the chat's lock is held, so the displayed text always
/// reflects the latest stored state.
pub struct ChecklistEngine {
    database: Arc<Database>,
    transport: Arc<dyn Transport>,
    locks: ChatLocks,
}

impl ChecklistEngine {
    pub fn new(database: Arc<Database>, transport: Arc<dyn Transport>) -> Self {
        Self {
            database,
            transport,
            locks: ChatLocks::default(),
        }
    }

    /// Post a fresh checklist into `chat_id`, replacing the previous one.
    pub async fn create(&self, chat_id: i64, raw_tasks: &str) -> Result<Checklist, ChecklistError> {
        let items = parse_tasks(raw_tasks);
        if items.is_empty() {
            return Err(ChecklistError::NoTasks);
        }

        let lock = self.locks.for_chat(chat_id);
        let _guard = lock.lock().await;

        let message_id = self
            .transport
            .send_message(chat_id, &render(&items), None)
            .await
            .map_err(ChecklistError::Transport)?;

        let checklist = Checklist {
            chat_id,
            message_id,
            items,
        };
        self.database.save_checklist(&checklist)?;

        info!("📋 Checklist with {} item(s) created in chat {}", checklist.items.len(), chat_id);
        Ok(checklist)
    }

    /// Complete item `index` (1-based) of the chat's checklist.
    pub async fn complete(&self, chat_id: i64, index: i64) -> Result<Completion, ChecklistError> {
        let lock = self.locks.for_chat(chat_id);
        let _guard = lock.lock().await;

        let (outcome, checklist) = self.database.complete_checklist_item(chat_id, index)?;

        if let (Completion::Done, Some(checklist)) = (outcome, checklist) {
            info!("✅ Item {} done in chat {}", index, chat_id);
            if let Err(e) = self
                .transport
                .edit_message(chat_id, checklist.message_id, &checklist.render())
                .await
            {
                warn!("Checklist stored but display not updated: {e}");
            }
        }

        Ok(outcome)
    }
}
