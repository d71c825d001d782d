//! Telegram client wrapper module.
//!
//! Provides the bot's connection, its update stream, and the chat
//! operations the welcome pipeline needs.

mod client;
mod gateway;
mod updates;

pub use client::{BotEvent, TelegramBot, TelegramError};
pub use gateway::{ChatGateway, ChatKind, ChatRef, LinkButton};
pub use updates::{RawMemberChange, RawPeer, RawText};
