use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::keeper::commands::CommandSyntax;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    telegram_bot_token: String,
    /// Users allowed to open the admin menu and issue privileged commands
    #[serde(default)]
    admin_ids: Vec<u64>,
    /// OpenAI API key for summaries (empty = summaries disabled)
    #[serde(default)]
    openai_api_key: String,
    openai_model: Option<String>,
    openai_base_url: Option<String>,
    summary_timeout_secs: Option<u64>,
    /// "slash" (`/send ...`) or "bare" (`send ...`)
    command_style: Option<String>,
    #[serde(default = "default_live_chat_titles")]
    live_chat_titles: bool,
    /// Directory for state files (logs, database). Defaults to current directory.
    data_dir: Option<String>,
    database_path: Option<String>,
}

fn default_live_chat_titles() -> bool {
    true
}

const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SUMMARY_TIMEOUT_SECS: u64 = 60;

pub struct Config {
    pub telegram_bot_token: String,
    pub admin_ids: HashSet<i64>,
    /// `None` when summaries are not configured.
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Upper bound on a single summary request.
    pub summary_timeout: Duration,
    pub command_style: CommandSyntax,
    /// Look chat titles up live instead of relying on archived titles only.
    pub live_chat_titles: bool,
    /// Directory for state files (logs, database).
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
}

impl Config {
    /// Load from a JSON file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Build purely from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(ConfigFile::default(), |key| std::env::var(key).ok())
    }

    pub fn load_with_env<P, E>(path: P, env: E) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        E: Fn(&str) -> Option<String>,
    {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;
        Self::build(file, env)
    }

    fn build<E>(mut file: ConfigFile, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        // Environment wins over the file, matching how the bot is deployed in containers
        if let Some(token) = env("BOT_TOKEN").filter(|t| !t.is_empty()) {
            file.telegram_bot_token = token;
        }
        if let Some(key) = env("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            file.openai_api_key = key;
        }
        if let Some(raw) = env("ADMIN_IDS").filter(|raw| !raw.trim().is_empty()) {
            file.admin_ids = parse_admin_ids(&raw)?;
        }

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }

        let summary_timeout_secs = file.summary_timeout_secs.unwrap_or(DEFAULT_SUMMARY_TIMEOUT_SECS);
        if summary_timeout_secs == 0 {
            return Err(ConfigError::Validation("summary_timeout_secs must be greater than 0".into()));
        }

        let command_style = match file.command_style.as_deref() {
            None | Some("slash") => CommandSyntax::Slash,
            Some("bare") => CommandSyntax::Bare,
            Some(other) => {
                return Err(ConfigError::Validation(format!(
                    "command_style must be \"slash\" or \"bare\", got \"{other}\""
                )));
            }
        };

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let database_path = file
            .database_path
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("groupkeeper.db"));

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            admin_ids: file.admin_ids.into_iter().map(|id| id as i64).collect(),
            openai_api_key: Some(file.openai_api_key).filter(|k| !k.is_empty()),
            openai_model: file.openai_model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: file
                .openai_base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            summary_timeout: Duration::from_secs(summary_timeout_secs),
            command_style,
            live_chat_titles: file.live_chat_titles,
            data_dir,
            database_path,
        })
    }
}

/// Parse a comma-separated list like "123, 456,,789".
fn parse_admin_ids(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| ConfigError::Validation(format!("ADMIN_IDS contains non-numeric id '{s}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config() {
        let file = write_config(r#"{
            "admin_ids": [123456],
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
        }"#);
        let config = Config::load_with_env(file.path(), no_env).expect("should load valid config");
        assert!(config.admin_ids.contains(&123456));
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.openai_model, "gpt-4.1-mini");
        assert_eq!(config.summary_timeout, Duration::from_secs(60));
        assert_eq!(config.command_style, CommandSyntax::Slash);
        assert!(config.live_chat_titles);
        assert_eq!(config.database_path, PathBuf::from("./groupkeeper.db"));
    }

    #[test]
    fn test_full_config() {
        let file = write_config(r#"{
            "admin_ids": [1, 2],
            "telegram_bot_token": "123:abc",
            "openai_api_key": "sk-test",
            "openai_model": "gpt-4o-mini",
            "openai_base_url": "http://localhost:8080/v1/",
            "summary_timeout_secs": 5,
            "command_style": "bare",
            "live_chat_titles": false,
            "data_dir": "/var/lib/gk"
        }"#);
        let config = Config::load_with_env(file.path(), no_env).unwrap();
        assert_eq!(config.admin_ids.len(), 2);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.openai_base_url, "http://localhost:8080/v1");
        assert_eq!(config.summary_timeout, Duration::from_secs(5));
        assert_eq!(config.command_style, CommandSyntax::Bare);
        assert!(!config.live_chat_titles);
        assert_eq!(config.database_path, PathBuf::from("/var/lib/gk/groupkeeper.db"));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(r#"{
            "admin_ids": [1],
            "telegram_bot_token": "123:file"
        }"#);
        let env: HashMap<&str, &str> = HashMap::from([
            ("BOT_TOKEN", "456:env"),
            ("OPENAI_API_KEY", "sk-env"),
            ("ADMIN_IDS", "10, 20,,30"),
        ]);
        let config = Config::load_with_env(file.path(), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.telegram_bot_token, "456:env");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.admin_ids, HashSet::from([10, 20, 30]));
    }

    #[test]
    fn test_blank_env_keeps_file_values() {
        let file = write_config(r#"{
            "admin_ids": [1, 2],
            "telegram_bot_token": "123:file"
        }"#);
        let env: HashMap<&str, &str> = HashMap::from([("BOT_TOKEN", ""), ("ADMIN_IDS", " ")]);
        let config = Config::load_with_env(file.path(), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.telegram_bot_token, "123:file");
        assert_eq!(config.admin_ids, HashSet::from([1, 2]));
    }

    #[test]
    fn test_env_only() {
        let env: HashMap<&str, &str> = HashMap::from([("BOT_TOKEN", "123:abc")]);
        let config = Config::build(ConfigFile::default(), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert!(config.admin_ids.is_empty());
        assert!(config.live_chat_titles);
    }

    #[test]
    fn test_bad_admin_ids_env() {
        let env: HashMap<&str, &str> = HashMap::from([("BOT_TOKEN", "123:abc"), ("ADMIN_IDS", "12,abc")]);
        let err = assert_err(Config::build(ConfigFile::default(), |k| env.get(k).map(|v| v.to_string())));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_empty_token() {
        let file = write_config(r#"{
            "admin_ids": [123],
            "telegram_bot_token": ""
        }"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_invalid_token_format_no_colon() {
        let file = write_config(r#"{
            "telegram_bot_token": "invalid_token_no_colon"
        }"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_invalid_token_format_empty_secret() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:"
        }"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let file = write_config(r#"{
            "telegram_bot_token": "123:abc",
            "summary_timeout_secs": 0
        }"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(err.to_string().contains("summary_timeout_secs"));
    }

    #[test]
    fn test_unknown_command_style() {
        let file = write_config(r#"{
            "telegram_bot_token": "123:abc",
            "command_style": "hash"
        }"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(err.to_string().contains("command_style"));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load_with_env("/nonexistent/path/config.json", no_env));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
