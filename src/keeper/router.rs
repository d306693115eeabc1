//! Command router: archival, authorization and dispatch of every inbound event.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::keeper::archive::Archive;
use crate::keeper::auth::{Action, AdminAllowList};
use crate::keeper::checklist::{ChecklistEngine, ChecklistError, Completion};
use crate::keeper::commands::{spec_for, Command, CommandKind, CommandSyntax};
use crate::keeper::database::Database;
use crate::keeper::message::{CallbackEvent, InboundMessage};
use crate::keeper::stats::Aggregator;
use crate::keeper::summary::SummaryGateway;
use crate::keeper::transport::{Button, Keyboard, Transport};

/// Reply when a summary range holds no text.
pub const NO_MESSAGES: &str = "No messages";

const MENU_PROMPT: &str = "Choose an action:";

/// Buttons of the admin menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Chats,
    Stats,
    Users,
    Send,
    Pin,
    Summary,
}

impl MenuAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "chats" => Some(Self::Chats),
            "stats" => Some(Self::Stats),
            "users" => Some(Self::Users),
            "send" => Some(Self::Send),
            "pin" => Some(Self::Pin),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }

    fn permission(self) -> Action {
        match self {
            Self::Chats => Action::ListChats,
            Self::Stats => Action::ChatStats,
            Self::Users => Action::ListUsers,
            Self::Send => Action::Send,
            Self::Pin => Action::Pin,
            Self::Summary => Action::Summary,
        }
    }
}

pub fn menu_keyboard() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::callback("Chats", "chats"), Button::callback("Stats", "stats")],
            vec![Button::callback("Send", "send"), Button::callback("Pin", "pin")],
            vec![Button::callback("Summary", "summary"), Button::callback("Users", "users")],
        ],
    }
}

/// Deployment settings the router needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct RouterSettings {
    pub admins: AdminAllowList,
    pub syntax: CommandSyntax,
    pub live_chat_titles: bool,
    /// Own username, without `@`. Slash commands for other bots are skipped.
    pub bot_username: Option<String>,
}

/// Everything the bot does with an event, wired from explicitly constructed parts.
pub struct Router {
    transport: Arc<dyn Transport>,
    archive: Archive,
    stats: Aggregator,
    summaries: SummaryGateway,
    checklists: ChecklistEngine,
    admins: AdminAllowList,
    syntax: CommandSyntax,
    bot_username: Option<String>,
}

impl Router {
    pub fn new(
        database: Arc<Database>,
        transport: Arc<dyn Transport>,
        summaries: SummaryGateway,
        settings: RouterSettings,
    ) -> Self {
        Self {
            archive: Archive::new(database.clone()),
            stats: Aggregator::new(database.clone(), transport.clone(), settings.live_chat_titles),
            checklists: ChecklistEngine::new(database, transport.clone()),
            transport,
            summaries,
            admins: settings.admins,
            syntax: settings.syntax,
            bot_username: settings.bot_username,
        }
    }

    /// Archive the message (groups only), then run it as a command if it is one.
    pub async fn handle_message(&self, msg: &InboundMessage) {
        if !msg.is_private {
            self.archive.record(&msg.to_record());
        }

        let Some(invocation) = self.syntax.recognize(&msg.text, self.bot_username.as_deref()) else {
            return;
        };

        match invocation.spec.action {
            Some(action) => {
                // Unauthorized senders get silence, as if the command didn't exist
                let authorized = msg
                    .sender_id
                    .is_some_and(|sender| self.admins.is_authorized(sender, action));
                if !authorized {
                    debug!("Ignoring /{} from non-admin {:?}", invocation.spec.name, msg.sender_id);
                    return;
                }
            }
            None => {
                if msg.is_private {
                    return;
                }
            }
        }

        let command = match invocation.parse() {
            Ok(command) => command,
            Err(e) => {
                // Bare words like "done" show up in ordinary chatter
                if self.syntax == CommandSyntax::Bare && invocation.spec.action.is_none() {
                    debug!("Ignoring unparsable {:?} in chat {}: {e}", msg.text, msg.chat_id);
                    return;
                }
                self.reply(msg.chat_id, &e.to_string()).await;
                return;
            }
        };

        info!("⚙️ {:?} from {:?} in chat {}", command, msg.sender_id, msg.chat_id);
        self.dispatch(msg, command).await;
    }

    async fn dispatch(&self, msg: &InboundMessage, command: Command) {
        let origin = msg.chat_id;
        match command {
            Command::Admin => {
                if let Err(e) = self.transport.send_message(origin, MENU_PROMPT, Some(menu_keyboard())).await {
                    warn!("Failed to open admin menu: {e}");
                }
            }
            Command::Send { chat_id, text } => {
                let reply = match self.transport.send_message(chat_id, &text, None).await {
                    Ok(_) => "Sent".to_string(),
                    Err(e) => format!("Failed to send: {e}"),
                };
                self.reply(origin, &reply).await;
            }
            Command::Pin { chat_id, text } => {
                let reply = match self.transport.send_message(chat_id, &text, None).await {
                    Ok(message_id) => match self.transport.pin_message(chat_id, message_id).await {
                        Ok(()) => "Sent and pinned".to_string(),
                        Err(e) => format!("Sent, but failed to pin: {e}"),
                    },
                    Err(e) => format!("Failed to send: {e}"),
                };
                self.reply(origin, &reply).await;
            }
            Command::Summary { chat_id, start, end } => {
                let texts = match self.stats.extract_range(chat_id, start, end) {
                    Ok(texts) => texts,
                    Err(e) => {
                        error!("Failed to read archive for summary: {e}");
                        self.reply(origin, &format!("Failed to read archive: {e}")).await;
                        return;
                    }
                };
                if texts.is_empty() {
                    self.reply(origin, NO_MESSAGES).await;
                    return;
                }
                let reply = match self.summaries.summarize(&texts).await {
                    Ok(summary) => summary,
                    Err(e) => {
                        error!("Summary of chat {chat_id} failed: {e}");
                        format!("Summary failed: {e}")
                    }
                };
                self.reply(origin, &reply).await;
            }
            Command::Checklist { chat_id, tasks } => {
                let reply = match self.checklists.create(chat_id, &tasks).await {
                    Ok(_) => "Checklist created".to_string(),
                    Err(ChecklistError::NoTasks) => {
                        format!("Usage: {}", self.syntax.usage(spec_for(CommandKind::Checklist)))
                    }
                    Err(e) => format!("Failed to create checklist: {e}"),
                };
                self.reply(origin, &reply).await;
            }
            Command::Done { index } => match self.checklists.complete(origin, index).await {
                Ok(Completion::Done) => self.reply(origin, "Task closed").await,
                Ok(outcome) => debug!("Nothing to do for item {index} in chat {origin}: {outcome:?}"),
                Err(e) => warn!("Failed to complete item {index} in chat {origin}: {e}"),
            },
        }
    }

    /// Acknowledge first so the caller's client stops spinning, then check rights.
    pub async fn handle_callback(&self, callback: &CallbackEvent) {
        if let Err(e) = self.transport.answer_callback(&callback.callback_id).await {
            warn!("Failed to answer callback: {e}");
        }

        let Some(action) = MenuAction::parse(&callback.data) else {
            debug!("Unknown callback data {:?}", callback.data);
            return;
        };
        if !self.admins.is_authorized(callback.sender_id, action.permission()) {
            debug!("Ignoring {:?} callback from non-admin {}", action, callback.sender_id);
            return;
        }

        let text = self.menu_response(action).await;

        match callback.origin {
            Some(origin) => {
                if let Err(e) = self.transport.edit_message(origin.chat_id, origin.message_id, &text).await {
                    warn!("Failed to edit menu, sending instead: {e}");
                    self.reply(callback.sender_id, &text).await;
                }
            }
            None => self.reply(callback.sender_id, &text).await,
        }
    }

    async fn menu_response(&self, action: MenuAction) -> String {
        match action {
            MenuAction::Chats => match self.stats.list_chats().await {
                Ok(chats) => {
                    let lines: Vec<String> = chats
                        .iter()
                        .map(|c| {
                            if c.title.is_empty() {
                                c.chat_id.to_string()
                            } else {
                                format!("{} - {}", c.chat_id, c.title)
                            }
                        })
                        .collect();
                    listing("Chats:", &lines, "None")
                }
                Err(e) => format!("Failed to read archive: {e}"),
            },
            MenuAction::Stats => match self.stats.chat_stats() {
                Ok(counts) => {
                    let lines: Vec<String> = counts
                        .iter()
                        .map(|(chat_id, count)| format!("{chat_id}: {count}"))
                        .collect();
                    listing("Stats:", &lines, "No data")
                }
                Err(e) => format!("Failed to read archive: {e}"),
            },
            MenuAction::Users => match self.stats.list_users() {
                Ok(users) => {
                    let lines: Vec<String> = users.iter().map(|u| u.to_string()).collect();
                    listing("Users:", &lines, "None")
                }
                Err(e) => format!("Failed to read archive: {e}"),
            },
            MenuAction::Send => self.usage_hint(CommandKind::Send),
            MenuAction::Pin => self.usage_hint(CommandKind::Pin),
            MenuAction::Summary => self.usage_hint(CommandKind::Summary),
        }
    }

    fn usage_hint(&self, kind: CommandKind) -> String {
        format!("Usage: {}", self.syntax.usage(spec_for(kind)))
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.transport.send_message(chat_id, text, None).await {
            warn!("Failed to reply in chat {chat_id}: {e}");
        }
    }
}

fn listing(header: &str, lines: &[String], empty: &str) -> String {
    if lines.is_empty() {
        format!("{header}\n{empty}")
    } else {
        format!("{header}\n{}", lines.join("\n"))
    }
}
