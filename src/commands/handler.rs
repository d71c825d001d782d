//! Command handler implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::types::{CommandResult, WelcomeCommand};
use crate::welcome::{StateFile, WelcomeStore};

/// Handles `/welcome` commands against the shared welcome store.
pub struct CommandHandler {
    /// Command word (e.g., "`/welcome`").
    prefix: String,

    /// Shared welcome state.
    store: Arc<WelcomeStore>,

    /// Bot username, so commands addressed to other bots are skipped.
    bot_username: Option<String>,

    /// Where toggles are persisted.
    state_file: Option<Arc<StateFile>>,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(prefix: String, store: Arc<WelcomeStore>) -> Self {
        Self {
            prefix,
            store,
            bot_username: None,
            state_file: None,
        }
    }

    /// Only accepts `@name` suffixes naming this bot.
    #[must_use]
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Persists toggles to `file` after every change.
    #[must_use]
    pub fn with_state_file(mut self, file: Arc<StateFile>) -> Self {
        self.state_file = Some(file);
        self
    }

    /// Parses a message addressed to this handler.
    ///
    /// Returns `None` if the message is not a command.
    #[must_use]
    pub fn parse(&self, message_text: &str) -> Option<WelcomeCommand> {
        WelcomeCommand::parse(message_text, &self.prefix, self.bot_username.as_deref())
    }

    /// Executes a parsed command in a chat.
    ///
    /// `is_admin` tells whether the sender administers the chat; only
    /// admins may toggle welcomes.
    pub async fn execute(
        &self,
        command: WelcomeCommand,
        chat_id: i64,
        chat_title: &str,
        is_admin: bool,
        now: DateTime<Utc>,
    ) -> CommandResult {
        debug!("Handling command: {} in {}", command, chat_id);

        let result = match command {
            WelcomeCommand::Usage => CommandResult::error(WelcomeCommand::usage(&self.prefix)),
            WelcomeCommand::Status => self.handle_status(chat_id, now),
            WelcomeCommand::On | WelcomeCommand::Off if !is_admin => CommandResult::error(
                "Sorry, only admins can change the welcome notification status!",
            ),
            WelcomeCommand::On => self.handle_toggle(chat_id, chat_title, true).await,
            WelcomeCommand::Off => self.handle_toggle(chat_id, chat_title, false).await,
        };

        info!("Command result: success={}", result.success);
        result
    }

    async fn handle_toggle(&self, chat_id: i64, chat_title: &str, enable: bool) -> CommandResult {
        if self.store.set_enabled(chat_id, enable) == enable {
            return CommandResult::error(if enable {
                "Welcome notification already enabled!"
            } else {
                "Welcome notification already disabled!"
            });
        }

        if let Some(file) = &self.state_file {
            Arc::clone(file).persist(Arc::clone(&self.store)).await;
        }

        let verb = if enable { "Enabled" } else { "Disabled" };
        CommandResult::success(format!("{verb} welcome in {chat_title}"))
    }

    fn handle_status(&self, chat_id: i64, now: DateTime<Utc>) -> CommandResult {
        let status = if self.store.is_enabled(chat_id) {
            "▶ Enabled"
        } else {
            "⏸ Disabled"
        };

        let cooldown = self.store.cooldown_remaining(chat_id, now).map_or_else(
            || "none".to_owned(),
            |left| format_minutes(left.num_seconds()),
        );

        CommandResult::success(format!("Welcome: {status}\nCooldown: {cooldown}"))
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Formats a remaining duration, rounding partial minutes up.
fn format_minutes(secs: i64) -> String {
    if secs < 60 {
        return "less than a minute left".to_owned();
    }
    match (secs + 59) / 60 {
        1 => "1 minute left".to_owned(),
        minutes => format!("{minutes} minutes left"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::welcome::{CooldownPolicy, PersistentStore};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap_or_default()
    }

    fn handler() -> CommandHandler {
        let store = Arc::new(WelcomeStore::new(CooldownPolicy::default(), 5));
        CommandHandler::new("/welcome".to_owned(), store)
    }

    #[tokio::test]
    async fn test_non_admin_rejected() {
        let handler = handler();
        let result = handler.execute(WelcomeCommand::Off, 1, "G", false, at(0)).await;
        assert!(!result.success);
        assert!(result.message.contains("only admins"));
        assert!(handler.store.is_enabled(1));
    }

    #[tokio::test]
    async fn test_toggle_off_and_on() {
        let handler = handler();
        let result = handler.execute(WelcomeCommand::Off, 1, "Rustaceans", true, at(0)).await;
        assert!(result.success);
        assert_eq!(result.message, "Disabled welcome in Rustaceans");
        assert!(!handler.store.is_enabled(1));

        let result = handler.execute(WelcomeCommand::Off, 1, "Rustaceans", true, at(0)).await;
        assert!(!result.success);
        assert!(result.message.contains("already disabled"));

        let result = handler.execute(WelcomeCommand::On, 1, "Rustaceans", true, at(0)).await;
        assert!(result.success);
        assert!(handler.store.is_enabled(1));
    }

    #[tokio::test]
    async fn test_already_enabled() {
        let handler = handler();
        let result = handler.execute(WelcomeCommand::On, 1, "G", true, at(0)).await;
        assert!(!result.success);
        assert!(result.message.contains("already enabled"));
    }

    #[tokio::test]
    async fn test_usage() {
        let handler = handler();
        let result = handler.execute(WelcomeCommand::Usage, 1, "G", false, at(0)).await;
        assert!(!result.success);
        assert!(result.message.starts_with("Usage:"));
    }

    #[tokio::test]
    async fn test_status_reports_cooldown() {
        let handler = handler();
        handler.store.trigger_cooldown(1, 15, at(0));
        let result = handler.execute(WelcomeCommand::Status, 1, "G", false, at(60)).await;
        assert!(result.success);
        assert!(result.message.contains("Enabled"));
        assert!(result.message.contains("14 minutes left"));
    }

    #[tokio::test]
    async fn test_toggle_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let handler = handler().with_state_file(Arc::new(StateFile::new(&path)));
        handler.execute(WelcomeCommand::Off, -100, "G", true, at(0)).await;

        let saved = PersistentStore::load(&path);
        assert_eq!(saved.chats.len(), 1);
        assert_eq!(saved.chats[0].chat_id, -100);
        assert!(!saved.chats[0].enabled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_succeed_once() {
        let handler = Arc::new(handler());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler.execute(WelcomeCommand::Off, 1, "G", true, at(0)).await
                })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap().success {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert!(!handler.store.is_enabled(1));
    }

    #[test]
    fn test_parse_skips_other_bots() {
        let handler = handler().with_bot_username(Some("guard_bot".to_owned()));
        assert_eq!(handler.parse("/welcome@guard_bot on"), Some(WelcomeCommand::On));
        assert_eq!(handler.parse("/welcome@other_bot on"), None);
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(30), "less than a minute left");
        assert_eq!(format_minutes(60), "1 minute left");
        assert_eq!(format_minutes(61), "2 minutes left");
        assert_eq!(format_minutes(600), "10 minutes left");
    }
}
