use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use lounge_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    CommandResult::success("config", render(&config))
}

/// One `- key = value (source: ...)` line per setting; the bot token is redacted.
pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let available_times = config
        .dialog
        .available_times
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let admin_chat_id =
        config.telegram.admin_chat_id.map_or_else(|| "<unset>".to_string(), |id| id.to_string());

    let entries: [(&str, String, &[&str]); 16] = [
        ("database.url", config.database.url.clone(), &["LOUNGE_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["LOUNGE_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["LOUNGE_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "telegram.bot_token",
            redact_token(config.telegram.bot_token.expose_secret()),
            &["LOUNGE_TELEGRAM_BOT_TOKEN", "BOT_TOKEN"],
        ),
        ("telegram.admin_chat_id", admin_chat_id, &["LOUNGE_TELEGRAM_ADMIN_CHAT_ID", "ADMIN_CHAT_ID"]),
        ("telegram.api_base_url", config.telegram.api_base_url.clone(), &["LOUNGE_TELEGRAM_API_BASE_URL"]),
        (
            "telegram.poll_timeout_secs",
            config.telegram.poll_timeout_secs.to_string(),
            &["LOUNGE_TELEGRAM_POLL_TIMEOUT_SECS"],
        ),
        ("dialog.available_times", available_times, &["LOUNGE_DIALOG_AVAILABLE_TIMES"]),
        (
            "dialog.booking_horizon_days",
            config.dialog.booking_horizon_days.to_string(),
            &["LOUNGE_DIALOG_BOOKING_HORIZON_DAYS"],
        ),
        (
            "dialog.coffee_followup_secs",
            config.dialog.coffee_followup_secs.to_string(),
            &["LOUNGE_DIALOG_COFFEE_FOLLOWUP_SECS"],
        ),
        ("server.bind_address", config.server.bind_address.clone(), &["LOUNGE_SERVER_BIND_ADDRESS"]),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["LOUNGE_SERVER_HEALTH_CHECK_PORT"],
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["LOUNGE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        ("logging.level", config.logging.level.clone(), &["LOUNGE_LOGGING_LEVEL", "LOUNGE_LOG_LEVEL"]),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["LOUNGE_LOGGING_FORMAT", "LOUNGE_LOG_FORMAT"],
        ),
        (
            "config.file",
            config_file_path
                .as_deref()
                .map_or_else(|| "<none>".to_string(), |path| path.display().to_string()),
            &[],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .iter()
            .map(|(key, value, env_keys)| render_line(key, value, source(key, env_keys))),
    );
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["lounge.toml", "config/lounge.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// The bot id before `:` is public; the secret after it never leaves the process.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) if !bot_id.is_empty() => format!("{bot_id}:***"),
        _ => "<redacted>".to_string(),
    }
}
