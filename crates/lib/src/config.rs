//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.botrelay/config.json`) and
//! environment. Credentials resolve once at startup into an immutable state;
//! nothing re-reads configuration per request.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Channel settings (Telegram, Viber, Instagram).
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Server bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Listening port (default 5000). Overridden by PORT env.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0" — webhooks arrive from the platforms).
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    5000
}

fn default_server_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
    #[serde(default)]
    pub viber: ViberChannelConfig,
    #[serde(default)]
    pub instagram: InstagramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// When set, setWebhook is called with this URL at startup so Telegram
    /// POSTs updates to /telegram; removed again on shutdown.
    pub webhook_url: Option<String>,
}

/// Viber channel config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViberChannelConfig {
    /// Bot auth token. Overridden by VIBER_AUTH_TOKEN env when set.
    /// Also keys the callback signature verification.
    pub auth_token: Option<String>,
    /// Bot display name included in outbound messages.
    #[serde(default = "default_viber_bot_name")]
    pub bot_name: String,
    /// Optional avatar URL included in outbound messages.
    pub avatar_url: Option<String>,
}

fn default_viber_bot_name() -> String {
    "MyMultichannelBot".to_string()
}

impl Default for ViberChannelConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            bot_name: default_viber_bot_name(),
            avatar_url: None,
        }
    }
}

/// Instagram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramChannelConfig {
    /// Shared secret for the GET /instagram handshake. Overridden by VERIFY_TOKEN env.
    pub verify_token: Option<String>,
}

fn env_or(var: &str, fallback: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            fallback
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    env_or("TELEGRAM_BOT_TOKEN", config.channels.telegram.bot_token.as_ref())
}

/// Resolve the Viber auth token: env VIBER_AUTH_TOKEN overrides config.
pub fn resolve_viber_token(config: &Config) -> Option<String> {
    env_or("VIBER_AUTH_TOKEN", config.channels.viber.auth_token.as_ref())
}

/// Resolve the Instagram verify token: env VERIFY_TOKEN overrides config.
pub fn resolve_instagram_verify_token(config: &Config) -> Option<String> {
    env_or("VERIFY_TOKEN", config.channels.instagram.verify_token.as_ref())
}

/// Resolve the listening port: env PORT overrides config.
pub fn resolve_port(config: &Config) -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or(config.server.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("BOTRELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".botrelay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or BOTRELAY_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
