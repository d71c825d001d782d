//! Chat member updates as seen by the welcome pipeline.

use chrono::{DateTime, Utc};

use crate::telegram::ChatRef;

/// Membership status of a user in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Member,
    Administrator,
    Owner,
    Restricted,
    Left,
    Banned,
}

/// The user a member update is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

/// A change of a user's membership in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberUpdate {
    pub chat: ChatRef,
    pub user: MemberInfo,
    /// Status before the change; `None` if the user was never in the chat.
    pub old: Option<MemberStatus>,
    /// Status after the change; `None` if the user is gone.
    pub new: Option<MemberStatus>,
    pub date: DateTime<Utc>,
}

impl MemberUpdate {
    /// A join: the user is now a plain member and was previously absent,
    /// gone, or banned.
    #[must_use]
    pub fn is_join(&self) -> bool {
        self.new == Some(MemberStatus::Member)
            && matches!(
                self.old,
                None | Some(MemberStatus::Left | MemberStatus::Banned)
            )
    }
}
