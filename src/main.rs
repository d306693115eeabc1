use std::path::Path;
use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use groupkeeper::config::{Config, ConfigError};
use groupkeeper::keeper::telegram::{callback_event, inbound_message};
use groupkeeper::keeper::{
    AdminAllowList, Database, Router, RouterSettings, SummaryGateway, TelegramClient, TextGenerator, Transport,
};
use groupkeeper::openai;

const DEFAULT_CONFIG_PATH: &str = "groupkeeper.json";

/// Explicit path, else the default file if present, else environment only.
fn load_config(explicit_path: Option<&str>) -> Result<Config, ConfigError> {
    match explicit_path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH),
        None => Config::from_env(),
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1);
    let config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = tracing_appender::rolling::never(&log_dir, "groupkeeper.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting groupkeeper...");
    match &config_path {
        Some(path) => info!("Loaded config from {path}"),
        None => info!("Loaded config from {DEFAULT_CONFIG_PATH} or environment"),
    }
    let admins = AdminAllowList::new(config.admin_ids.iter().copied());
    if admins.is_empty() {
        warn!("No admin IDs configured, privileged commands are disabled");
    } else {
        info!("{} admin(s): {:?}", admins.len(), config.admin_ids);
    }

    let database = match Database::open(&config.database_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open database {:?}: {e}", config.database_path);
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            Some(me.username().to_string())
        }
        Err(e) => {
            warn!("Failed to get bot info, accepting commands for any @mention: {e}");
            None
        }
    };
    let transport: Arc<dyn Transport> = Arc::new(TelegramClient::new(bot.clone()));

    let backend: Option<Arc<dyn TextGenerator>> = match &config.openai_api_key {
        Some(key) => match openai::Client::new(
            key.clone(),
            config.openai_model.clone(),
            config.openai_base_url.clone(),
            config.summary_timeout,
        ) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn TextGenerator>),
            Err(e) => {
                warn!("OpenAI client failed to initialize: {e}");
                None
            }
        },
        None => None,
    };
    let summaries = SummaryGateway::new(backend, config.summary_timeout);
    if summaries.is_configured() {
        info!("Summaries enabled (model {})", config.openai_model);
    } else {
        info!("Summaries disabled");
    }

    let router = Arc::new(Router::new(
        database,
        transport,
        summaries,
        RouterSettings {
            admins,
            syntax: config.command_style,
            live_chat_titles: config.live_chat_titles,
            bot_username,
        },
    ));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_channel_post().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        // Handlers run concurrently, even for the same chat; checklists serialize themselves
        .distribution_function(|_| None::<std::convert::Infallible>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, router: Arc<Router>) -> ResponseResult<()> {
    router.handle_message(&inbound_message(&msg)).await;
    Ok(())
}

async fn handle_callback(query: CallbackQuery, router: Arc<Router>) -> ResponseResult<()> {
    router.handle_callback(&callback_event(&query)).await;
    Ok(())
}
