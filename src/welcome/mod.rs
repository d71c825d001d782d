//! Group welcome feature.
//!
//! Greets new members and suppresses greetings while a chat is hit by a
//! burst of joins. The burst policy and the per-chat state are pure
//! in-memory bookkeeping; all Telegram I/O goes through
//! [`crate::telegram::ChatGateway`].

mod caption;
mod member;
mod persist;
mod policy;
mod service;
mod state;
mod store;

pub use caption::{REENABLED_NOTICE, burst_notice, fallback_greeting, welcome_buttons, welcome_caption};
pub use member::{MemberInfo, MemberStatus, MemberUpdate};
pub use persist::{PersistError, PersistentChat, PersistentStore, StateFile};
pub use policy::{CooldownPolicy, cooldown_minutes};
pub use service::WelcomeService;
pub use state::{ChatJoinWindow, ChatState, CooldownState, MessageHistory};
pub use store::{JoinAction, JoinDecision, WelcomeStore};
