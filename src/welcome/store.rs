//! Welcome state store shared by the update handlers.
//!
//! Each chat's state lives behind its own `DashMap` entry, so every
//! operation on one chat is atomic while different chats proceed in
//! parallel. Nothing here blocks on I/O.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use super::persist::{PersistentChat, PersistentStore};
use super::policy::CooldownPolicy;
use super::state::{ChatState, CooldownState};

/// What to do with one join event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAction {
    /// Welcomes are off or suppressed; nothing was recorded.
    Drop,

    /// This join completed a burst; a cooldown was started.
    BurstDetected {
        /// Joins inside the window, this one included.
        burst: u32,
        /// Length of the cooldown just started.
        minutes: u32,
    },

    /// Greet the new member.
    Welcome,
}

/// Outcome of [`WelcomeStore::evaluate_join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinDecision {
    /// An expired cooldown was lifted by this event; announce it once.
    pub auto_reenabled: bool,

    /// What to do with the join itself.
    pub action: JoinAction,
}

impl JoinDecision {
    const fn drop() -> Self {
        Self {
            auto_reenabled: false,
            action: JoinAction::Drop,
        }
    }
}

/// Per-chat welcome state keyed by chat id.
#[derive(Debug)]
pub struct WelcomeStore {
    policy: CooldownPolicy,
    history_limit: usize,
    chats: DashMap<i64, ChatState>,
}

impl WelcomeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(policy: CooldownPolicy, history_limit: usize) -> Self {
        Self {
            policy,
            history_limit,
            chats: DashMap::new(),
        }
    }

    /// The policy this store applies.
    #[must_use]
    pub const fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    /// Runs the per-join control flow for one chat atomically.
    ///
    /// 1. Admin-disabled chats and chats under an active cooldown drop the
    ///    event without touching any state.
    /// 2. An expired cooldown is cleared and reported as re-enabled.
    /// 3. The join is recorded; a burst starts a cooldown.
    pub fn evaluate_join(&self, chat_id: i64, now: DateTime<Utc>) -> JoinDecision {
        let mut chat = self
            .chats
            .entry(chat_id)
            .or_insert_with(|| ChatState::new(self.history_limit));

        if !chat.enabled {
            debug!(chat_id, "Welcome disabled by admin, dropping join");
            return JoinDecision::drop();
        }

        if chat.cooldown.is_some_and(|cooldown| cooldown.is_active(now)) {
            debug!(chat_id, "Chat in cooldown, dropping join");
            return JoinDecision::drop();
        }

        let auto_reenabled = chat.take_expired_cooldown(now);
        if auto_reenabled {
            info!(chat_id, "Cooldown expired, welcome re-enabled");
        }

        let burst = chat.joins.record(now, self.policy.window);
        if self.policy.is_burst(burst) {
            let minutes = self.policy.cooldown_minutes(burst);
            chat.cooldown = Some(CooldownState::starting_at(now, minutes));
            info!(chat_id, burst, minutes, "Join burst detected, welcome suppressed");
            return JoinDecision {
                auto_reenabled,
                action: JoinAction::BurstDetected { burst, minutes },
            };
        }

        JoinDecision {
            auto_reenabled,
            action: JoinAction::Welcome,
        }
    }

    /// Records a join and returns the burst size for the chat.
    pub fn record_join(&self, chat_id: i64, now: DateTime<Utc>) -> u32 {
        self.chats
            .entry(chat_id)
            .or_insert_with(|| ChatState::new(self.history_limit))
            .joins
            .record(now, self.policy.window)
    }

    /// Whether an unexpired cooldown suppresses the chat's welcome output.
    #[must_use]
    pub fn is_suppressed(&self, chat_id: i64, now: DateTime<Utc>) -> bool {
        self.chats
            .get(&chat_id)
            .and_then(|chat| chat.cooldown)
            .is_some_and(|cooldown| cooldown.is_active(now))
    }

    /// Starts a cooldown of `minutes`, replacing any previous one.
    pub fn trigger_cooldown(&self, chat_id: i64, minutes: u32, now: DateTime<Utc>) {
        self.chats
            .entry(chat_id)
            .or_insert_with(|| ChatState::new(self.history_limit))
            .cooldown = Some(CooldownState::starting_at(now, minutes));
    }

    /// Clears an expired cooldown. Returns true the first time this is
    /// called after expiry, false otherwise.
    pub fn take_expired_cooldown(&self, chat_id: i64, now: DateTime<Utc>) -> bool {
        self.chats
            .get_mut(&chat_id)
            .is_some_and(|mut chat| chat.take_expired_cooldown(now))
    }

    /// Time left on the chat's cooldown, if one is active.
    #[must_use]
    pub fn cooldown_remaining(&self, chat_id: i64, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.chats
            .get(&chat_id)
            .and_then(|chat| chat.cooldown)
            .filter(|cooldown| cooldown.is_active(now))
            .map(|cooldown| cooldown.remaining(now))
    }

    /// Admin toggle state; chats default to enabled.
    #[must_use]
    pub fn is_enabled(&self, chat_id: i64) -> bool {
        self.chats.get(&chat_id).is_none_or(|chat| chat.enabled)
    }

    /// Sets the admin toggle. Returns the previous value.
    pub fn set_enabled(&self, chat_id: i64, enabled: bool) -> bool {
        let mut chat = self
            .chats
            .entry(chat_id)
            .or_insert_with(|| ChatState::new(self.history_limit));
        std::mem::replace(&mut chat.enabled, enabled)
    }

    /// Remembers a welcome message and returns the ids that fell out of
    /// the chat's history and should be deleted.
    pub fn remember_sent(&self, chat_id: i64, message_id: i32) -> Vec<i32> {
        self.chats
            .entry(chat_id)
            .or_insert_with(|| ChatState::new(self.history_limit))
            .sent
            .push(message_id)
    }

    /// Captures toggles and cooldowns for persistence.
    #[must_use]
    pub fn snapshot(&self) -> PersistentStore {
        let mut chats: Vec<PersistentChat> = self
            .chats
            .iter()
            .filter(|entry| !entry.enabled || entry.cooldown.is_some())
            .map(|entry| PersistentChat {
                chat_id: *entry.key(),
                enabled: entry.enabled,
                cooldown_until: entry.cooldown.map(|c| c.expires_at),
            })
            .collect();
        chats.sort_by_key(|c| c.chat_id);
        PersistentStore { chats }
    }

    /// Loads toggles and cooldowns captured by [`Self::snapshot`].
    pub fn restore(&self, persisted: PersistentStore) {
        for saved in persisted.chats {
            match self.chats.entry(saved.chat_id) {
                Entry::Occupied(mut entry) => {
                    let chat = entry.get_mut();
                    chat.enabled = saved.enabled;
                    chat.cooldown = saved.cooldown_until.map(|expires_at| CooldownState { expires_at });
                }
                Entry::Vacant(entry) => {
                    let mut chat = ChatState::new(self.history_limit);
                    chat.enabled = saved.enabled;
                    chat.cooldown = saved.cooldown_until.map(|expires_at| CooldownState { expires_at });
                    entry.insert(chat);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap_or_default()
    }

    fn store() -> WelcomeStore {
        WelcomeStore::new(CooldownPolicy::default(), 5)
    }

    #[test]
    fn test_record_join_prunes_window() {
        let store = store();
        store.record_join(1, at(0));
        store.record_join(1, at(1));
        store.record_join(1, at(2));
        assert_eq!(store.record_join(1, at(15)), 1);
    }

    #[test]
    fn test_chat_isolation() {
        let store = store();
        for i in 0..10 {
            store.record_join(1, at(i / 2));
        }
        assert_eq!(store.record_join(2, at(5)), 1);
        assert_eq!(store.record_join(1, at(5)), 11);
    }

    #[test]
    fn test_suppressed_until_exact_expiry() {
        let store = store();
        assert!(!store.is_suppressed(1, at(0)));
        store.trigger_cooldown(1, 5, at(0));
        assert!(store.is_suppressed(1, at(0)));
        assert!(store.is_suppressed(1, at(300)));
        assert!(!store.is_suppressed(1, at(301)));
        assert!(!store.is_suppressed(2, at(10)));
    }

    #[test]
    fn test_trigger_cooldown_overwrites() {
        let store = store();
        store.trigger_cooldown(1, 60, at(0));
        store.trigger_cooldown(1, 5, at(10));
        assert!(store.is_suppressed(1, at(310)));
        assert!(!store.is_suppressed(1, at(311)));
    }

    #[test]
    fn test_evaluate_join_burst_at_threshold() {
        let store = store();
        for _ in 0..19 {
            let decision = store.evaluate_join(7, at(0));
            assert_eq!(decision.action, JoinAction::Welcome);
        }
        let decision = store.evaluate_join(7, at(1));
        assert_eq!(
            decision.action,
            JoinAction::BurstDetected {
                burst: 20,
                minutes: 5
            }
        );
        assert!(!decision.auto_reenabled);
        assert!(store.is_suppressed(7, at(2)));
    }

    #[test]
    fn test_evaluate_join_drops_during_cooldown_without_recording() {
        let store = store();
        store.trigger_cooldown(7, 5, at(0));
        for i in 0..50 {
            assert_eq!(store.evaluate_join(7, at(i)).action, JoinAction::Drop);
        }
        // After expiry the window is empty: the dropped joins never counted.
        let decision = store.evaluate_join(7, at(301));
        assert!(decision.auto_reenabled);
        assert_eq!(decision.action, JoinAction::Welcome);
        assert_eq!(store.record_join(7, at(301)), 2);
    }

    #[test]
    fn test_auto_reenable_fires_once() {
        let store = store();
        store.trigger_cooldown(7, 1, at(0));
        assert!(store.evaluate_join(7, at(61)).auto_reenabled);
        assert!(!store.evaluate_join(7, at(62)).auto_reenabled);
        assert!(!store.take_expired_cooldown(7, at(63)));
    }

    #[test]
    fn test_evaluate_join_admin_disabled() {
        let store = store();
        assert!(store.set_enabled(7, false));
        for _ in 0..30 {
            assert_eq!(store.evaluate_join(7, at(0)).action, JoinAction::Drop);
        }
        assert!(!store.is_suppressed(7, at(0)));
        assert_eq!(store.record_join(7, at(0)), 1);
    }

    #[test]
    fn test_take_expired_cooldown() {
        let store = store();
        assert!(!store.take_expired_cooldown(7, at(0)));
        store.trigger_cooldown(7, 1, at(0));
        assert!(!store.take_expired_cooldown(7, at(60)));
        assert!(store.take_expired_cooldown(7, at(61)));
        assert!(!store.take_expired_cooldown(7, at(62)));
    }

    #[test]
    fn test_cooldown_remaining() {
        let store = store();
        store.trigger_cooldown(7, 5, at(0));
        assert_eq!(store.cooldown_remaining(7, at(60)), Some(TimeDelta::minutes(4)));
        assert_eq!(store.cooldown_remaining(7, at(301)), None);
        assert_eq!(store.cooldown_remaining(8, at(0)), None);
    }

    #[test]
    fn test_remember_sent_evicts_past_limit() {
        let store = store();
        for id in 1..=5 {
            assert!(store.remember_sent(7, id).is_empty());
        }
        assert_eq!(store.remember_sent(7, 6), vec![1]);
    }

    #[test]
    fn test_snapshot_restore() {
        let store = store();
        store.set_enabled(1, false);
        store.trigger_cooldown(2, 5, at(0));
        store.record_join(3, at(0));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.chats.len(), 2);

        let restored = WelcomeStore::new(CooldownPolicy::default(), 5);
        restored.restore(snapshot);
        assert!(!restored.is_enabled(1));
        assert!(restored.is_enabled(2));
        assert!(restored.is_suppressed(2, at(300)));
        assert!(restored.is_enabled(3));
    }

    #[test]
    fn test_concurrent_joins_are_not_lost() {
        let store = std::sync::Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..2 {
                        store.record_join(9, at(0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().ok();
        }
        assert_eq!(store.record_join(9, at(0)), 17);
    }
}
