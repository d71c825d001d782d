//! Application settings and Telegram configuration.

use std::path::PathBuf;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::welcome::CooldownPolicy;

use super::{
    DEFAULT_BASE_COOLDOWN_MINUTES, DEFAULT_HISTORY_LIMIT, DEFAULT_JOIN_THRESHOLD,
    DEFAULT_MAX_COOLDOWN_MINUTES, DEFAULT_TIME_WINDOW_SECS, MAX_TIME_WINDOW_SECS,
};

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Bot token issued by `@BotFather`.
    pub bot_token: String,

    /// Path to the session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("welcome.session")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String, bot_token: String) -> Self {
        Self {
            api_id,
            api_hash,
            bot_token,
            session_path: default_session_path(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID`, `TG_API_HASH` and `TG_BOT_TOKEN` to be set.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let bot_token = std::env::var("TG_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TG_BOT_TOKEN"))?;
        if !bot_token.contains(':') {
            return Err(ConfigError::InvalidBotToken);
        }

        let session_path = std::env::var("TG_SESSION_PATH")
            .map_or_else(|_| default_session_path(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            bot_token,
            session_path,
        })
    }
}

/// Welcome feature settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeSettings {
    /// Joins inside the window that count as a burst.
    #[serde(default = "default_join_threshold")]
    pub join_threshold: u32,

    /// Sliding window length in seconds.
    #[serde(default = "default_time_window")]
    pub time_window_secs: u64,

    /// Cooldown applied when a burst just reaches the threshold.
    #[serde(default = "default_base_cooldown")]
    pub base_cooldown_minutes: u32,

    /// Upper bound on any cooldown.
    #[serde(default = "default_max_cooldown")]
    pub max_cooldown_minutes: u32,

    /// Number of welcome messages kept per chat before the oldest is deleted.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Where toggles and cooldowns are persisted.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Command used by admins to toggle welcomes.
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_join_threshold() -> u32 {
    DEFAULT_JOIN_THRESHOLD
}

fn default_time_window() -> u64 {
    DEFAULT_TIME_WINDOW_SECS
}

fn default_base_cooldown() -> u32 {
    DEFAULT_BASE_COOLDOWN_MINUTES
}

fn default_max_cooldown() -> u32 {
    DEFAULT_MAX_COOLDOWN_MINUTES
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_state_path() -> PathBuf {
    PathBuf::from("welcome_state.json")
}

fn default_command() -> String {
    "/welcome".to_owned()
}

impl Default for WelcomeSettings {
    fn default() -> Self {
        Self {
            join_threshold: default_join_threshold(),
            time_window_secs: default_time_window(),
            base_cooldown_minutes: default_base_cooldown(),
            max_cooldown_minutes: default_max_cooldown(),
            history_limit: default_history_limit(),
            state_path: default_state_path(),
            command: default_command(),
        }
    }
}

impl WelcomeSettings {
    /// Creates welcome settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            join_threshold: env_parse("WELCOME_JOIN_THRESHOLD")
                .unwrap_or_else(default_join_threshold),
            time_window_secs: env_parse("WELCOME_TIME_WINDOW_SECS")
                .unwrap_or_else(default_time_window),
            base_cooldown_minutes: env_parse("WELCOME_BASE_COOLDOWN_MINUTES")
                .unwrap_or_else(default_base_cooldown),
            max_cooldown_minutes: env_parse("WELCOME_MAX_COOLDOWN_MINUTES")
                .unwrap_or_else(default_max_cooldown),
            history_limit: env_parse("WELCOME_HISTORY_LIMIT")
                .unwrap_or_else(default_history_limit),
            state_path: std::env::var("WELCOME_STATE_PATH")
                .map_or_else(|_| default_state_path(), PathBuf::from),
            command: std::env::var("WELCOME_COMMAND").unwrap_or_else(|_| default_command()),
        }
    }

    /// Builds the cooldown policy described by these settings.
    ///
    /// Windows longer than [`MAX_TIME_WINDOW_SECS`] are clamped.
    #[must_use]
    pub fn policy(&self) -> CooldownPolicy {
        if self.time_window_secs > MAX_TIME_WINDOW_SECS {
            warn!(
                "Join window of {}s is too long, using {}s",
                self.time_window_secs, MAX_TIME_WINDOW_SECS
            );
        }
        let window_secs = self.time_window_secs.min(MAX_TIME_WINDOW_SECS);
        CooldownPolicy {
            threshold: self.join_threshold,
            window: TimeDelta::seconds(i64::try_from(window_secs).unwrap_or(0)),
            base_minutes: self.base_cooldown_minutes,
            max_minutes: self.max_cooldown_minutes,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,

    #[error("Invalid bot token format (expected <id>:<secret>)")]
    InvalidBotToken,
}
