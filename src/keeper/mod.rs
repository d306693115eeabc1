//! Group keeper core - archives messages and serves admin commands and checklists.

pub mod archive;
pub mod auth;
pub mod checklist;
pub mod commands;
pub mod database;
pub mod message;
pub mod router;
pub mod stats;
pub mod summary;
pub mod telegram;
pub mod transport;


pub use auth::AdminAllowList;
pub use commands::CommandSyntax;
pub use database::Database;
pub use message::{CallbackEvent, InboundMessage};
pub use router::{Router, RouterSettings};
pub use summary::{SummaryGateway, TextGenerator};
pub use telegram::TelegramClient;
pub use transport::Transport;
