//! Welcome pipeline: turns member updates into chat output.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::caption::{REENABLED_NOTICE, burst_notice, fallback_greeting, welcome_buttons, welcome_caption};
use super::member::MemberUpdate;
use super::persist::StateFile;
use super::store::{JoinAction, JoinDecision, WelcomeStore};
use crate::telegram::{ChatGateway, ChatRef, TelegramError};

/// Handles member updates for every chat the bot is in.
pub struct WelcomeService<G> {
    gateway: G,
    store: Arc<WelcomeStore>,
    state_file: Option<Arc<StateFile>>,
}

impl<G: ChatGateway> WelcomeService<G> {
    /// Creates a service that does not persist its state.
    pub fn new(gateway: G, store: Arc<WelcomeStore>) -> Self {
        Self {
            gateway,
            store,
            state_file: None,
        }
    }

    /// Persists toggles and cooldowns to `file` whenever they change.
    #[must_use]
    pub fn with_state_file(mut self, file: Arc<StateFile>) -> Self {
        self.state_file = Some(file);
        self
    }

    /// The store shared with the command handler.
    #[must_use]
    pub fn store(&self) -> &Arc<WelcomeStore> {
        &self.store
    }

    /// The gateway used for output.
    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Processes one member update.
    ///
    /// Returns the decision taken, or `None` if the update is not a join.
    /// Delivery failures are logged and never undo the decision.
    pub async fn handle(&self, update: &MemberUpdate) -> Option<JoinDecision> {
        if !update.is_join() {
            return None;
        }

        let chat_key = update.chat.key();
        let decision = self.store.evaluate_join(chat_key, update.date);
        debug!(chat_id = chat_key, user_id = update.user.id, ?decision, "Join evaluated");

        if decision.auto_reenabled || matches!(decision.action, JoinAction::BurstDetected { .. }) {
            self.persist().await;
        }

        if decision.auto_reenabled
            && self.notify(&update.chat, REENABLED_NOTICE).await.is_err()
        {
            return Some(decision);
        }

        match decision.action {
            JoinAction::Drop => {}
            JoinAction::BurstDetected { burst, minutes } => {
                let _ = self.notify(&update.chat, &burst_notice(burst, minutes)).await;
            }
            JoinAction::Welcome => self.welcome(update).await,
        }

        Some(decision)
    }

    async fn welcome(&self, update: &MemberUpdate) {
        let chat = &update.chat;
        let count = match self.gateway.member_count(chat).await {
            Ok(count) => count,
            Err(e) => {
                debug!("Could not fetch member count for {}: {}", chat.key(), e);
                None
            }
        };

        let caption = welcome_caption(&chat.title, &update.user, count);
        let buttons = welcome_buttons(&update.user, self.gateway.bot_username());

        match self.gateway.send_text(chat, &caption, &buttons).await {
            Ok(message_id) => {
                info!(chat_id = chat.key(), user_id = update.user.id, "Welcomed new member");
                for old in self.store.remember_sent(chat.key(), message_id) {
                    if let Err(e) = self.gateway.delete_message(chat, old).await {
                        debug!("Could not delete old welcome {}: {}", old, e);
                    }
                }
            }
            Err(TelegramError::TopicClosed) => {
                debug!("Topic closed in {}, skipping welcome", chat.key());
            }
            Err(e) => {
                warn!("Failed to send welcome in {}: {}. Sending plain greeting.", chat.key(), e);
                let _ = self.notify(chat, &fallback_greeting(&update.user)).await;
            }
        }
    }

    /// Sends a plain notice. Errors are logged and returned so the caller
    /// can stop on a closed topic.
    async fn notify(&self, chat: &ChatRef, text: &str) -> Result<(), TelegramError> {
        match self.gateway.send_text(chat, text, &[]).await {
            Ok(_) => Ok(()),
            Err(TelegramError::TopicClosed) => {
                debug!("Topic closed in {}, notice dropped", chat.key());
                Err(TelegramError::TopicClosed)
            }
            Err(e) => {
                warn!("Failed to send notice in {}: {}", chat.key(), e);
                Err(e)
            }
        }
    }

    /// Writes toggles and cooldowns to disk, if a state file is configured.
    pub async fn persist(&self) {
        if let Some(file) = &self.state_file {
            Arc::clone(file).persist(Arc::clone(&self.store)).await;
        }
    }
}

impl<G> std::fmt::Debug for WelcomeService<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WelcomeService")
            .field("state_file", &self.state_file.as_ref().map(|f| f.path()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::telegram::LinkButton;
    use crate::welcome::member::{MemberInfo, MemberStatus};
    use crate::welcome::policy::CooldownPolicy;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Sent {
        pub chat: i64,
        pub text: String,
        pub buttons: usize,
    }

    #[derive(Debug, Default)]
    struct MockGateway {
        pub sent: Mutex<Vec<Sent>>,
        pub deleted: Mutex<Vec<i32>>,
        pub next_id: AtomicI32,
        pub fail_captions: bool,
        pub topic_closed: bool,
    }

    impl MockGateway {
        pub fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|s| s.text.clone()).collect()
        }
    }

    impl ChatGateway for MockGateway {
        async fn send_text(
            &self,
            chat: &ChatRef,
            text: &str,
            buttons: &[LinkButton],
        ) -> Result<i32, TelegramError> {
            if self.topic_closed {
                return Err(TelegramError::TopicClosed);
            }
            if self.fail_captions && !buttons.is_empty() {
                return Err(TelegramError::Invocation("MEDIA_EMPTY".to_owned()));
            }
            self.sent.lock().unwrap().push(Sent {
                chat: chat.key(),
                text: text.to_owned(),
                buttons: buttons.len(),
            });
            Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn delete_message(&self, _chat: &ChatRef, message_id: i32) -> Result<(), TelegramError> {
            self.deleted.lock().unwrap().push(message_id);
            Ok(())
        }

        async fn member_count(&self, _chat: &ChatRef) -> Result<Option<i32>, TelegramError> {
            Ok(Some(42))
        }

        fn bot_username(&self) -> Option<&str> {
            Some("welcome_guard_bot")
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap_or_default()
    }

    fn join(user_id: i64, secs: i64) -> MemberUpdate {
        MemberUpdate {
            chat: ChatRef::channel(555, 1, "Music Lovers"),
            user: MemberInfo {
                id: user_id,
                first_name: format!("user{user_id}"),
                username: None,
            },
            old: Some(MemberStatus::Left),
            new: Some(MemberStatus::Member),
            date: at(secs),
        }
    }

    fn service(gateway: MockGateway, threshold: u32) -> WelcomeService<MockGateway> {
        let policy = CooldownPolicy {
            threshold,
            ..CooldownPolicy::default()
        };
        WelcomeService::new(gateway, Arc::new(WelcomeStore::new(policy, 5)))
    }

    #[tokio::test]
    async fn test_welcome_sent_with_buttons() {
        let service = service(MockGateway::default(), 20);
        let decision = service.handle(&join(1, 0)).await.unwrap();
        assert_eq!(decision.action, JoinAction::Welcome);

        let sent = service.gateway().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat, -1_000_000_000_555);
        assert_eq!(sent[0].buttons, 2);
        assert!(sent[0].text.contains("Music Lovers"));
        assert!(sent[0].text.contains("Total Members ✧ 42"));
    }

    #[tokio::test]
    async fn test_non_join_ignored() {
        let service = service(MockGateway::default(), 20);
        let mut update = join(1, 0);
        update.old = Some(MemberStatus::Administrator);
        assert!(service.handle(&update).await.is_none());
        assert!(service.gateway().texts().is_empty());
    }

    #[tokio::test]
    async fn test_burst_announced_then_silent() {
        let service = service(MockGateway::default(), 3);
        service.handle(&join(1, 0)).await;
        service.handle(&join(2, 0)).await;
        let decision = service.handle(&join(3, 1)).await.unwrap();
        assert_eq!(decision.action, JoinAction::BurstDetected { burst: 3, minutes: 5 });

        let decision = service.handle(&join(4, 2)).await.unwrap();
        assert_eq!(decision.action, JoinAction::Drop);

        let texts = service.gateway().texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[2].starts_with("Massive join detected (x3)"));
    }

    #[tokio::test]
    async fn test_reenable_notice_after_cooldown() {
        let service = service(MockGateway::default(), 2);
        service.handle(&join(1, 0)).await;
        service.handle(&join(2, 0)).await;
        let decision = service.handle(&join(3, 301)).await.unwrap();
        assert!(decision.auto_reenabled);
        assert_eq!(decision.action, JoinAction::Welcome);

        let texts = service.gateway().texts();
        assert_eq!(texts[texts.len() - 2], REENABLED_NOTICE);
        assert!(texts[texts.len() - 1].contains("user3"));
    }

    #[tokio::test]
    async fn test_old_welcomes_deleted() {
        let service = service(MockGateway::default(), 100);
        for user in 0..7 {
            service.handle(&join(user, user * 20)).await;
        }
        assert_eq!(*service.gateway().deleted.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fallback_greeting_on_failure() {
        let gateway = MockGateway {
            fail_captions: true,
            ..MockGateway::default()
        };
        let service = service(gateway, 20);
        service.handle(&join(9, 0)).await;
        assert_eq!(service.gateway().texts(), vec!["🎉 Welcome, user9!".to_owned()]);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_cooldown() {
        let gateway = MockGateway {
            topic_closed: true,
            ..MockGateway::default()
        };
        let service = service(gateway, 1);
        let decision = service.handle(&join(1, 0)).await.unwrap();
        assert!(matches!(decision.action, JoinAction::BurstDetected { .. }));
        assert!(service.store().is_suppressed(ChatRef::channel(555, 1, "").key(), at(1)));
    }

    #[tokio::test]
    async fn test_burst_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let service = service(MockGateway::default(), 1)
            .with_state_file(Arc::new(StateFile::new(&path)));
        service.handle(&join(1, 0)).await;
        let saved = crate::welcome::PersistentStore::load(&path);
        assert_eq!(saved.chats.len(), 1);
        assert!(saved.chats[0].cooldown_until.is_some());
    }
}
