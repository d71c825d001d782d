//! Command handling module.
//!
//! Processes the `/welcome` admin command sent in group chats.

mod handler;
mod types;

pub use handler::CommandHandler;
pub use types::{CommandResult, WelcomeCommand};
