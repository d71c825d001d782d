//! Welcome Guard Library
//!
//! A Telegram bot that welcomes new group members.
//!
//! This crate provides the core functionality for:
//! - Detecting join bursts and suppressing welcomes during a cooldown
//! - Tracking per-chat welcome state and persisting admin toggles
//! - Connecting to Telegram via `MTProto`
//! - Handling the `/welcome` admin command

pub mod commands;
pub mod config;
pub mod telegram;
pub mod welcome;
