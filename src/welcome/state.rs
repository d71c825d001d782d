//! Per-chat welcome state.

use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Recent join timestamps of one chat inside a sliding window.
#[derive(Debug, Clone, Default)]
pub struct ChatJoinWindow {
    joins: VecDeque<DateTime<Utc>>,
}

impl ChatJoinWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a join at `now` and returns the number of joins held at or
    /// after `now - window`, the current one included.
    ///
    /// A `now` older than joins already recorded is kept in order and
    /// pruned like any other entry; the newer joins still count.
    pub fn record(&mut self, now: DateTime<Utc>, window: TimeDelta) -> u32 {
        let pos = self.joins.partition_point(|t| *t <= now);
        self.joins.insert(pos, now);
        self.prune(now, window);
        u32::try_from(self.joins.len()).unwrap_or(u32::MAX)
    }

    /// Drops every join older than `now - window`. A window reaching past
    /// the representable dates keeps everything.
    pub fn prune(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        let Some(cutoff) = now.checked_sub_signed(window) else {
            return;
        };
        while self.joins.front().is_some_and(|t| *t < cutoff) {
            self.joins.pop_front();
        }
    }

    /// Number of joins currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.joins.len()
    }

    /// Whether no joins are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}

/// Suppression window of one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownState {
    /// Last instant at which welcome output is still suppressed.
    pub expires_at: DateTime<Utc>,
}

impl CooldownState {
    /// Starts a cooldown of `minutes` at `now`.
    #[must_use]
    pub fn starting_at(now: DateTime<Utc>, minutes: u32) -> Self {
        Self {
            expires_at: now + TimeDelta::minutes(i64::from(minutes)),
        }
    }

    /// True up to and including `expires_at`, false strictly after.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }

    /// Time left before suppression lifts, zero once expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        (self.expires_at - now).max(TimeDelta::zero())
    }
}

/// Fixed-capacity FIFO of message ids the bot sent to one chat.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    capacity: usize,
    ids: VecDeque<i32>,
}

impl MessageHistory {
    /// Creates an empty history holding at most `capacity` ids.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ids: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends an id and returns the ids evicted to stay within capacity,
    /// oldest first.
    pub fn push(&mut self, id: i32) -> Vec<i32> {
        self.ids.push_back(id);
        let mut evicted = Vec::new();
        while self.ids.len() > self.capacity {
            if let Some(old) = self.ids.pop_front() {
                evicted.push(old);
            }
        }
        evicted
    }

    /// Ids currently held, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.ids.iter().copied()
    }

    /// Number of ids held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no ids are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Everything the bot tracks for one chat.
#[derive(Debug, Clone)]
pub struct ChatState {
    /// Admin toggle; welcomes are on unless an admin turned them off.
    pub enabled: bool,

    /// Recent joins.
    pub joins: ChatJoinWindow,

    /// Active or expired-but-unacknowledged cooldown.
    pub cooldown: Option<CooldownState>,

    /// Welcome messages sent, for eviction.
    pub sent: MessageHistory,
}

impl ChatState {
    /// Creates the state of a chat never seen before.
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            enabled: true,
            joins: ChatJoinWindow::new(),
            cooldown: None,
            sent: MessageHistory::new(history_limit),
        }
    }

    /// Clears an expired cooldown. Returns true only for the call that
    /// clears it.
    pub fn take_expired_cooldown(&mut self, now: DateTime<Utc>) -> bool {
        match self.cooldown {
            Some(cooldown) if !cooldown.is_active(now) => {
                self.cooldown = None;
                true
            }
            _ => false,
        }
    }
}
