//! Welcome Guard - Main Entry Point
//!
//! A Telegram bot that greets new group members and holds greetings back
//! while a group is flooded with joins.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use welcome_guard::commands::{CommandHandler, WelcomeCommand};
use welcome_guard::config::{TelegramConfig, WelcomeSettings};
use welcome_guard::telegram::{BotEvent, ChatGateway, ChatRef, TelegramBot};
use welcome_guard::welcome::{StateFile, WelcomeService, WelcomeStore};

/// Telegram group welcome bot with join-burst protection.
#[derive(Parser, Debug)]
#[command(name = "welcome_guard")]
#[command(about = "Greet new group members, with join-burst cooldowns")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

type Service = WelcomeService<Arc<TelegramBot>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let settings = WelcomeSettings::from_env_with_defaults();
    let policy = settings.policy();
    info!(
        "Burst policy: {} joins in {}s, cooldown {}..{} minutes",
        policy.threshold,
        settings.time_window_secs,
        policy.base_minutes,
        policy.max_minutes
    );

    let store = Arc::new(WelcomeStore::new(policy, settings.history_limit));
    let state_file = Arc::new(StateFile::new(&settings.state_path));
    let persisted = state_file.load();
    info!("Restored state for {} chats", persisted.chats.len());
    store.restore(persisted);

    // Connect to Telegram
    let bot = TelegramBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    if !bot.is_authorized().await.context("Failed to check authorization")? {
        bot.bot_sign_in(&tg_config.bot_token, &tg_config.api_hash)
            .await
            .context("Bot authentication failed")?;
    }

    let username = bot.load_username().await.unwrap_or_else(|e| {
        warn!("Failed to fetch bot username: {}", e);
        None
    });

    let bot = Arc::new(bot);
    let service = Arc::new(
        WelcomeService::new(Arc::clone(&bot), Arc::clone(&store))
            .with_state_file(Arc::clone(&state_file)),
    );
    let commands = Arc::new(
        CommandHandler::new(settings.command.clone(), Arc::clone(&store))
            .with_bot_username(username)
            .with_state_file(state_file),
    );

    info!("Bot is running. Use Ctrl+C to stop.");
    info!("Command: {} [on|off|status]", settings.command);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            event = bot.next_event() => match event {
                Ok(Some(event)) => dispatch(event, &service, &commands, &bot),
                Ok(None) => {}
                Err(e) => warn!("Failed to receive update: {}", e),
            }
        }
    }

    // Cleanup
    service.persist().await;
    bot.disconnect();

    Ok(())
}

/// Handles one event on its own task so slow sends never block the
/// update stream.
fn dispatch(
    event: BotEvent,
    service: &Arc<Service>,
    commands: &Arc<CommandHandler>,
    bot: &Arc<TelegramBot>,
) {
    match event {
        BotEvent::Member(update) => {
            let service = Arc::clone(service);
            tokio::spawn(async move {
                service.handle(&update).await;
            });
        }
        BotEvent::Text {
            chat,
            sender_id,
            text,
        } => {
            let Some(command) = commands.parse(&text) else {
                return;
            };
            let commands = Arc::clone(commands);
            let bot = Arc::clone(bot);
            tokio::spawn(async move {
                run_command(command, &chat, sender_id, &commands, &bot).await;
            });
        }
    }
}

async fn run_command(
    command: WelcomeCommand,
    chat: &ChatRef,
    sender_id: i64,
    commands: &CommandHandler,
    bot: &TelegramBot,
) {
    let is_admin = match command {
        WelcomeCommand::On | WelcomeCommand::Off => {
            bot.is_admin(chat, sender_id).await.unwrap_or_else(|e| {
                warn!("Admin check failed for {} in {}: {}", sender_id, chat.key(), e);
                false
            })
        }
        WelcomeCommand::Status | WelcomeCommand::Usage => false,
    };

    let result = commands
        .execute(command, chat.key(), &chat.title, is_admin, Utc::now())
        .await;
    if let Err(e) = bot.send_text(chat, &result.message, &[]).await {
        warn!("Failed to reply to command in {}: {}", chat.key(), e);
    }
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
