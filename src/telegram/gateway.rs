//! The Telegram operations the welcome pipeline depends on.

use std::future::Future;
use std::sync::Arc;

use super::TelegramError;

/// Offset applied to channel ids in the Bot API "marked" id scheme.
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// Kind of group a chat is, with what MTProto needs to address it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// Basic group; addressed by id alone.
    Group,
    /// Supergroup or channel.
    Channel { access_hash: i64 },
}

/// A group the bot can talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRef {
    /// Bare MTProto id.
    pub id: i64,
    pub kind: ChatKind,
    pub title: String,
}

impl ChatRef {
    /// A basic group.
    #[must_use]
    pub fn group(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: ChatKind::Group,
            title: title.into(),
        }
    }

    /// A supergroup.
    #[must_use]
    pub fn channel(id: i64, access_hash: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: ChatKind::Channel { access_hash },
            title: title.into(),
        }
    }

    /// Marked id, unique across groups and supergroups (`-id` for groups,
    /// `-100…id` for supergroups).
    #[must_use]
    pub const fn key(&self) -> i64 {
        match self.kind {
            ChatKind::Group => -self.id,
            ChatKind::Channel { .. } => -(CHANNEL_ID_OFFSET + self.id),
        }
    }
}

/// An inline keyboard button opening a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

impl LinkButton {
    #[must_use]
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Outbound chat operations.
pub trait ChatGateway: Send + Sync {
    /// Sends a text message with one button per row; returns its id.
    fn send_text(
        &self,
        chat: &ChatRef,
        text: &str,
        buttons: &[LinkButton],
    ) -> impl Future<Output = Result<i32, TelegramError>> + Send;

    /// Deletes a message the bot sent.
    fn delete_message(
        &self,
        chat: &ChatRef,
        message_id: i32,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;

    /// Number of members in the chat, if Telegram reports it.
    fn member_count(
        &self,
        chat: &ChatRef,
    ) -> impl Future<Output = Result<Option<i32>, TelegramError>> + Send;

    /// Username of the bot, used in "add me" links.
    fn bot_username(&self) -> Option<&str>;
}

impl<T: ChatGateway> ChatGateway for Arc<T> {
    fn send_text(
        &self,
        chat: &ChatRef,
        text: &str,
        buttons: &[LinkButton],
    ) -> impl Future<Output = Result<i32, TelegramError>> + Send {
        (**self).send_text(chat, text, buttons)
    }

    fn delete_message(
        &self,
        chat: &ChatRef,
        message_id: i32,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send {
        (**self).delete_message(chat, message_id)
    }

    fn member_count(
        &self,
        chat: &ChatRef,
    ) -> impl Future<Output = Result<Option<i32>, TelegramError>> + Send {
        (**self).member_count(chat)
    }

    fn bot_username(&self) -> Option<&str> {
        (**self).bot_username()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_keys() {
        assert_eq!(ChatRef::group(123, "g").key(), -123);
        assert_eq!(ChatRef::channel(123, 9, "c").key(), -1_000_000_000_123);
    }
}
