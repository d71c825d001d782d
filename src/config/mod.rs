//! Configuration module for the welcome bot.
//!
//! Handles loading of Telegram API credentials and the welcome
//! feature's tunables from the environment.

mod settings;

pub use settings::{ConfigError, TelegramConfig, WelcomeSettings};

/// Joins within the window that make a burst.
pub const DEFAULT_JOIN_THRESHOLD: u32 = 20;

/// Sliding join window, in seconds.
pub const DEFAULT_TIME_WINDOW_SECS: u64 = 10;

/// Longest accepted join window, in seconds (one day).
pub const MAX_TIME_WINDOW_SECS: u64 = 86_400;

/// Cooldown for a burst that just reaches the threshold, in minutes.
pub const DEFAULT_BASE_COOLDOWN_MINUTES: u32 = 5;

/// Hard ceiling on any cooldown, in minutes.
pub const DEFAULT_MAX_COOLDOWN_MINUTES: u32 = 60;

/// Welcome messages kept per chat before the oldest is deleted.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;
