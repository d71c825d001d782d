//! Extraction of the updates the bot reacts to from raw MTProto types.

use chrono::{DateTime, Utc};
use grammers_tl_types as tl;

use crate::welcome::MemberStatus;

/// A group as named in an update, before it is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawPeer {
    Group(i64),
    Channel(i64),
}

/// A participant change, before chat and user are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMemberChange {
    pub peer: RawPeer,
    pub user_id: i64,
    pub old: Option<MemberStatus>,
    pub new: Option<MemberStatus>,
    pub date: DateTime<Utc>,
}

/// An incoming group text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText {
    pub peer: RawPeer,
    pub sender_id: i64,
    pub text: String,
}

/// Pulls a participant change out of a raw update.
pub fn member_change(update: &tl::enums::Update) -> Option<RawMemberChange> {
    match update {
        tl::enums::Update::ChannelParticipant(u) => Some(RawMemberChange {
            peer: RawPeer::Channel(u.channel_id),
            user_id: u.user_id,
            old: u.prev_participant.as_ref().map(channel_status),
            new: u.new_participant.as_ref().map(channel_status),
            date: unix_date(u.date),
        }),
        tl::enums::Update::ChatParticipant(u) => Some(RawMemberChange {
            peer: RawPeer::Group(u.chat_id),
            user_id: u.user_id,
            old: u.prev_participant.as_ref().map(chat_status),
            new: u.new_participant.as_ref().map(chat_status),
            date: unix_date(u.date),
        }),
        _ => None,
    }
}

/// Pulls an incoming group text out of a raw message. Outgoing messages,
/// private chats and messages without a user sender are skipped.
pub fn group_text(message: &tl::enums::Message) -> Option<RawText> {
    let tl::enums::Message::Message(m) = message else {
        return None;
    };
    if m.out || m.message.is_empty() {
        return None;
    }
    let peer = match &m.peer_id {
        tl::enums::Peer::Channel(p) => RawPeer::Channel(p.channel_id),
        tl::enums::Peer::Chat(p) => RawPeer::Group(p.chat_id),
        tl::enums::Peer::User(_) => return None,
    };
    let Some(tl::enums::Peer::User(sender)) = &m.from_id else {
        return None;
    };
    Some(RawText {
        peer,
        sender_id: sender.user_id,
        text: m.message.clone(),
    })
}

/// Status of a supergroup participant.
pub fn channel_status(participant: &tl::enums::ChannelParticipant) -> MemberStatus {
    match participant {
        tl::enums::ChannelParticipant::Participant(_)
        | tl::enums::ChannelParticipant::ParticipantSelf(_) => MemberStatus::Member,
        tl::enums::ChannelParticipant::Creator(_) => MemberStatus::Owner,
        tl::enums::ChannelParticipant::Admin(_) => MemberStatus::Administrator,
        tl::enums::ChannelParticipant::Banned(b) => {
            let tl::enums::ChatBannedRights::Rights(rights) = &b.banned_rights;
            if rights.view_messages {
                MemberStatus::Banned
            } else if b.left {
                MemberStatus::Left
            } else {
                MemberStatus::Restricted
            }
        }
        tl::enums::ChannelParticipant::Left(_) => MemberStatus::Left,
    }
}

/// Status of a basic group participant.
pub fn chat_status(participant: &tl::enums::ChatParticipant) -> MemberStatus {
    match participant {
        tl::enums::ChatParticipant::Participant(_) => MemberStatus::Member,
        tl::enums::ChatParticipant::Creator(_) => MemberStatus::Owner,
        tl::enums::ChatParticipant::Admin(_) => MemberStatus::Administrator,
    }
}

/// Converts an MTProto date, falling back to now for out-of-range values.
pub fn unix_date(date: i32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(date), 0).unwrap_or_else(Utc::now)
}
