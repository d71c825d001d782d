//! Join-burst cooldown policy.
//!
//! A burst is the number of joins a chat sees inside a sliding window.
//! Once a burst reaches the threshold, welcome output is suppressed for a
//! number of minutes that grows linearly with the burst size and is capped.

use chrono::TimeDelta;

use crate::config::{
    DEFAULT_BASE_COOLDOWN_MINUTES, DEFAULT_JOIN_THRESHOLD, DEFAULT_MAX_COOLDOWN_MINUTES,
    DEFAULT_TIME_WINDOW_SECS,
};

/// Minutes added per join above the threshold.
const MINUTES_PER_EXTRA_JOIN: u32 = 2;

/// Cooldown in minutes for a burst, with the default cap of 60 minutes.
///
/// Returns 0 when `burst < threshold`.
#[must_use]
pub fn cooldown_minutes(burst: u32, threshold: u32, base: u32) -> u32 {
    capped_cooldown_minutes(burst, threshold, base, DEFAULT_MAX_COOLDOWN_MINUTES)
}

fn capped_cooldown_minutes(burst: u32, threshold: u32, base: u32, cap: u32) -> u32 {
    if burst < threshold {
        return 0;
    }
    let extra = burst.saturating_sub(threshold);
    base.saturating_add(extra.saturating_mul(MINUTES_PER_EXTRA_JOIN))
        .min(cap)
}

/// Tunables of the join-burst policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Joins inside the window that count as a burst.
    pub threshold: u32,

    /// Length of the sliding join window.
    pub window: TimeDelta,

    /// Cooldown for a burst of exactly `threshold` joins.
    pub base_minutes: u32,

    /// Ceiling on any cooldown.
    pub max_minutes: u32,
}

impl Default for CooldownPolicy {
    #[allow(clippy::cast_possible_wrap)]
    fn default() -> Self {
        Self {
            threshold: DEFAULT_JOIN_THRESHOLD,
            window: TimeDelta::seconds(DEFAULT_TIME_WINDOW_SECS as i64),
            base_minutes: DEFAULT_BASE_COOLDOWN_MINUTES,
            max_minutes: DEFAULT_MAX_COOLDOWN_MINUTES,
        }
    }
}

impl CooldownPolicy {
    /// Whether a burst of this size triggers a cooldown.
    #[must_use]
    pub const fn is_burst(&self, burst: u32) -> bool {
        burst >= self.threshold
    }

    /// Cooldown in minutes for a burst under this policy.
    #[must_use]
    pub fn cooldown_minutes(&self, burst: u32) -> u32 {
        capped_cooldown_minutes(burst, self.threshold, self.base_minutes, self.max_minutes)
    }
}
