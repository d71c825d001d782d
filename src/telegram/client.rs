//! Telegram client wrapper for the welcome bot.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use grammers_client::client::{UpdateStream, UpdatesConfiguration};
use grammers_client::update::Update;
use grammers_client::{Client, InvocationError, SenderPool, sender};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::gateway::{ChatGateway, ChatKind, ChatRef, LinkButton};
use super::updates::{RawPeer, group_text, member_change};
use crate::config::TelegramConfig;
use crate::welcome::{MemberInfo, MemberUpdate};

/// Name used when a joining user cannot be looked up.
const UNKNOWN_MEMBER: &str = "New member";

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Forum topic is closed")]
    TopicClosed,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(&'static str),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        if err_str.contains("TOPIC_CLOSED") {
            return Self::TopicClosed;
        }

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str)
        {
            return Self::FloodWait(seconds);
        }

        Self::Invocation(err_str)
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        let found = err_msg.char_indices().find_map(|(idx, _)| {
            err_msg
                .get(idx..idx + pattern.len())
                .filter(|candidate| candidate.eq_ignore_ascii_case(pattern))
                .map(|_| idx + pattern.len())
        });
        if let Some(start) = found {
            let num_str: String = err_msg[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// Something the bot has to react to.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// A participant changed status in a group.
    Member(MemberUpdate),

    /// A text message in a group, possibly a command.
    Text {
        chat: ChatRef,
        sender_id: i64,
        text: String,
    },
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Incoming updates.
    updates: Mutex<UpdateStream>,

    /// Bot username, known after sign-in.
    username: OnceLock<String>,

    /// Resolved groups.
    chats: DashMap<RawPeer, ChatRef>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if connection fails.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let updates = client.stream_updates(
            updates,
            UpdatesConfiguration {
                catch_up: false,
                ..Default::default()
            },
        )
        .await
        .map_err(|e| TelegramError::Connection(e.to_string()))?;

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok(Self {
            client,
            handle: handle.thin,
            updates: Mutex::new(updates),
            username: OnceLock::new(),
            chats: DashMap::new(),
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Signs in with a bot token.
    ///
    /// # Errors
    ///
    /// Returns an error if Telegram rejects the token.
    pub async fn bot_sign_in(&self, token: &str, api_hash: &str) -> Result<(), TelegramError> {
        info!("Signing in as bot...");

        self.client
            .bot_sign_in(token, api_hash)
            .await
            .map(|_| info!("Successfully signed in!"))
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Fetches and remembers the bot's own username.
    ///
    /// # Errors
    ///
    /// Returns an error if not authorized or API call fails.
    pub async fn load_username(&self) -> Result<Option<String>, TelegramError> {
        if !self.is_authorized().await? {
            return Err(TelegramError::NotAuthorized);
        }

        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::UserSelf],
        };

        let users = self.client.invoke(&request).await?;
        let username = match users.first() {
            Some(tl::enums::User::User(user)) => user.username.clone(),
            _ => None,
        };

        if let Some(name) = &username {
            info!("Running as @{}", name);
            let _ = self.username.set(name.clone());
        } else {
            warn!("Bot has no username; 'add me' buttons are disabled");
        }
        Ok(username)
    }

    /// Waits for the next update the bot cares about.
    ///
    /// Returns `Ok(None)` for updates that are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the update stream fails.
    pub async fn next_event(&self) -> Result<Option<BotEvent>, TelegramError> {
        let update = {
            let mut stream = self.updates.lock().await;
            stream.next().await?
        };

        match update {
            Update::NewMessage(message) => {
                let Some(text) = group_text(&(*message).raw) else {
                    return Ok(None);
                };
                let chat = self.resolve_chat(text.peer).await?;
                Ok(Some(BotEvent::Text {
                    chat,
                    sender_id: text.sender_id,
                    text: text.text,
                }))
            }
            Update::Raw(raw) => {
                let Some(change) = member_change(&raw.raw) else {
                    return Ok(None);
                };
                let chat = self.resolve_chat(change.peer).await?;
                let user = self.resolve_member(change.user_id).await;
                Ok(Some(BotEvent::Member(MemberUpdate {
                    chat,
                    user,
                    old: change.old,
                    new: change.new,
                    date: change.date,
                })))
            }
            _ => Ok(None),
        }
    }

    /// Checks whether a user administers a chat.
    ///
    /// # Errors
    ///
    /// Returns an error if the participant lookup fails.
    pub async fn is_admin(&self, chat: &ChatRef, user_id: i64) -> Result<bool, TelegramError> {
        match chat.kind {
            ChatKind::Channel { access_hash } => {
                let request = tl::functions::channels::GetParticipant {
                    channel: input_channel(chat.id, access_hash),
                    participant: input_user_peer(user_id),
                };
                let tl::enums::channels::ChannelParticipant::Participant(result) =
                    self.client.invoke(&request).await?;
                Ok(matches!(
                    result.participant,
                    tl::enums::ChannelParticipant::Creator(_)
                        | tl::enums::ChannelParticipant::Admin(_)
                ))
            }
            ChatKind::Group => {
                let participants = self.group_participants(chat.id).await?;
                Ok(participants.iter().any(|p| match p {
                    tl::enums::ChatParticipant::Creator(c) => c.user_id == user_id,
                    tl::enums::ChatParticipant::Admin(a) => a.user_id == user_id,
                    tl::enums::ChatParticipant::Participant(_) => false,
                }))
            }
        }
    }

    /// Resolves a group's title and access hash, caching the result.
    async fn resolve_chat(&self, peer: RawPeer) -> Result<ChatRef, TelegramError> {
        if let Some(chat) = self.chats.get(&peer) {
            return Ok(chat.clone());
        }

        let chat = match peer {
            RawPeer::Channel(channel_id) => {
                let request = tl::functions::channels::GetChannels {
                    id: vec![input_channel(channel_id, 0)],
                };
                let chats = self.client.invoke(&request).await?;
                chat_list(chats)
                    .into_iter()
                    .find_map(|c| match c {
                        tl::enums::Chat::Channel(ch) if ch.id == channel_id => Some(
                            ChatRef::channel(ch.id, ch.access_hash.unwrap_or(0), ch.title),
                        ),
                        _ => None,
                    })
                    .ok_or(TelegramError::UnexpectedResponse("channel not returned"))?
            }
            RawPeer::Group(chat_id) => {
                let request = tl::functions::messages::GetChats { id: vec![chat_id] };
                let chats = self.client.invoke(&request).await?;
                chat_list(chats)
                    .into_iter()
                    .find_map(|c| match c {
                        tl::enums::Chat::Chat(g) if g.id == chat_id => {
                            Some(ChatRef::group(g.id, g.title))
                        }
                        _ => None,
                    })
                    .ok_or(TelegramError::UnexpectedResponse("group not returned"))?
            }
        };

        debug!("Resolved chat {} ({})", chat.key(), chat.title);
        self.chats.insert(peer, chat.clone());
        Ok(chat)
    }

    /// Looks up a joining user's name. Never fails; unknown users get a
    /// placeholder name.
    async fn resolve_member(&self, user_id: i64) -> MemberInfo {
        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::User(tl::types::InputUser {
                user_id,
                access_hash: 0,
            })],
        };

        match self.client.invoke(&request).await {
            Ok(users) => {
                if let Some(tl::enums::User::User(user)) = users.first() {
                    return MemberInfo {
                        id: user_id,
                        first_name: user
                            .first_name
                            .clone()
                            .unwrap_or_else(|| UNKNOWN_MEMBER.to_owned()),
                        username: user.username.clone(),
                    };
                }
            }
            Err(e) => debug!("Could not look up user {}: {}", user_id, e),
        }

        MemberInfo {
            id: user_id,
            first_name: UNKNOWN_MEMBER.to_owned(),
            username: None,
        }
    }

    async fn group_participants(
        &self,
        chat_id: i64,
    ) -> Result<Vec<tl::enums::ChatParticipant>, TelegramError> {
        let request = tl::functions::messages::GetFullChat { chat_id };
        let tl::enums::messages::ChatFull::Full(full) = self.client.invoke(&request).await?;
        match full.full_chat {
            tl::enums::ChatFull::Full(chat) => match chat.participants {
                tl::enums::ChatParticipants::Participants(p) => Ok(p.participants),
                tl::enums::ChatParticipants::Forbidden(_) => Ok(Vec::new()),
            },
            tl::enums::ChatFull::ChannelFull(_) => {
                Err(TelegramError::UnexpectedResponse("channel info for a basic group"))
            }
        }
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

impl ChatGateway for TelegramBot {
    async fn send_text(
        &self,
        chat: &ChatRef,
        text: &str,
        buttons: &[LinkButton],
    ) -> Result<i32, TelegramError> {
        debug!("Sending to {}: \"{}\"", chat.key(), truncate_for_log(text, 30));

        let reply_markup = (!buttons.is_empty()).then(|| inline_keyboard(buttons));
        let request = tl::functions::messages::SendMessage {
            no_webpage: true,
            silent: false,
            background: false,
            clear_draft: false,
            noforwards: false,
            update_stickersets_order: false,
            invert_media: false,
            allow_paid_floodskip: false,
            peer: input_peer(chat),
            reply_to: None,
            message: text.to_owned(),
            random_id: rand::random(),
            reply_markup,
            entities: None,
            schedule_date: None,
            schedule_repeat_period: None,
            send_as: None,
            quick_reply_shortcut: None,
            effect: None,
            allow_paid_stars: None,
            suggested_post: None,
            rich_message: None,
        };

        match self.client.invoke(&request).await {
            Ok(updates) => sent_message_id(&updates)
                .ok_or(TelegramError::UnexpectedResponse("no message id in send result")),
            Err(e) => {
                let err: TelegramError = e.into();
                if let TelegramError::FloodWait(seconds) = &err {
                    warn!("Flood wait triggered: {} seconds", seconds);
                }
                Err(err)
            }
        }
    }

    async fn delete_message(&self, chat: &ChatRef, message_id: i32) -> Result<(), TelegramError> {
        match chat.kind {
            ChatKind::Channel { access_hash } => {
                let request = tl::functions::channels::DeleteMessages {
                    channel: input_channel(chat.id, access_hash),
                    id: vec![message_id],
                };
                self.client.invoke(&request).await?;
            }
            ChatKind::Group => {
                let request = tl::functions::messages::DeleteMessages {
                    revoke: true,
                    id: vec![message_id],
                };
                self.client.invoke(&request).await?;
            }
        }
        Ok(())
    }

    async fn member_count(&self, chat: &ChatRef) -> Result<Option<i32>, TelegramError> {
        match chat.kind {
            ChatKind::Channel { access_hash } => {
                let request = tl::functions::channels::GetFullChannel {
                    channel: input_channel(chat.id, access_hash),
                };
                let tl::enums::messages::ChatFull::Full(full) =
                    self.client.invoke(&request).await?;
                match full.full_chat {
                    tl::enums::ChatFull::ChannelFull(channel) => Ok(channel.participants_count),
                    tl::enums::ChatFull::Full(_) => Ok(None),
                }
            }
            ChatKind::Group => {
                let participants = self.group_participants(chat.id).await?;
                Ok(i32::try_from(participants.len()).ok().filter(|n| *n > 0))
            }
        }
    }

    fn bot_username(&self) -> Option<&str> {
        self.username.get().map(String::as_str)
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("username", &self.username.get())
            .field("cached_chats", &self.chats.len())
            .finish_non_exhaustive()
    }
}

fn input_channel(channel_id: i64, access_hash: i64) -> tl::enums::InputChannel {
    tl::enums::InputChannel::Channel(tl::types::InputChannel {
        channel_id,
        access_hash,
    })
}

fn input_user_peer(user_id: i64) -> tl::enums::InputPeer {
    tl::enums::InputPeer::User(tl::types::InputPeerUser {
        user_id,
        access_hash: 0,
    })
}

fn input_peer(chat: &ChatRef) -> tl::enums::InputPeer {
    match chat.kind {
        ChatKind::Group => tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: chat.id }),
        ChatKind::Channel { access_hash } => {
            tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                channel_id: chat.id,
                access_hash,
            })
        }
    }
}

fn inline_keyboard(buttons: &[LinkButton]) -> tl::enums::ReplyMarkup {
    let rows = buttons
        .iter()
        .map(|b| {
            tl::enums::KeyboardButtonRow::Row(tl::types::KeyboardButtonRow {
                buttons: vec![tl::enums::KeyboardButton::Url(tl::types::KeyboardButtonUrl {
                    style: None,
                    text: b.text.clone(),
                    url: b.url.clone(),
                })],
            })
        })
        .collect();
    tl::enums::ReplyMarkup::ReplyInlineMarkup(tl::types::ReplyInlineMarkup { rows })
}

fn chat_list(chats: tl::enums::messages::Chats) -> Vec<tl::enums::Chat> {
    match chats {
        tl::enums::messages::Chats::Chats(c) => c.chats,
        tl::enums::messages::Chats::Slice(c) => c.chats,
    }
}

/// Finds the id of the message just sent in a `SendMessage` result.
fn sent_message_id(updates: &tl::enums::Updates) -> Option<i32> {
    let from_list = |list: &[tl::enums::Update]| {
        list.iter().find_map(|u| match u {
            tl::enums::Update::MessageId(m) => Some(m.id),
            _ => None,
        })
    };
    match updates {
        tl::enums::Updates::UpdateShortSentMessage(u) => Some(u.id),
        tl::enums::Updates::Updates(u) => from_list(&u.updates),
        tl::enums::Updates::Combined(u) => from_list(&u.updates),
        _ => None,
    }
}

/// Truncates a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
