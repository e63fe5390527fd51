//! Failed-login accounting with a timed lockout window.
//!
//! Counters are keyed by an opaque lockout key chosen by the gate (the caller
//! session by default). A key becomes locked once it reaches `max_attempts`
//! failures and stays locked until `window` has passed since the most recent
//! failure. Once `window` has passed, the counter is forgotten whatever its
//! value, the same rule the store sweeper applies.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

use super::store::{LockoutState, SessionStore};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_SECONDS: i64 = 15 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutDecision {
    Allowed,
    Locked { retry_after_seconds: u64 },
}

/// Whole minutes a locked-out caller should wait, rounded up.
#[must_use]
pub fn retry_after_minutes(retry_after_seconds: u64) -> u64 {
    retry_after_seconds.div_ceil(60)
}

pub struct LockoutTracker {
    store: Arc<dyn SessionStore>,
    max_attempts: u32,
    window: TimeDelta,
}

impl LockoutTracker {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, max_attempts: u32, window: TimeDelta) -> Self {
        Self {
            store,
            max_attempts,
            window,
        }
    }

    #[must_use]
    pub fn failure_count(&self, key: &str) -> u32 {
        self.store
            .lockout(key)
            .map_or(0, |state| state.failure_count)
    }

    fn window_passed(&self, state: &LockoutState, now: DateTime<Utc>) -> bool {
        now - state.last_failure_time >= self.window
    }

    /// Count one failed attempt; returns the new total.
    pub fn record_failure(&self, key: &str, now: DateTime<Utc>) -> u32 {
        let failure_count = match self.store.lockout(key) {
            Some(state) if !self.window_passed(&state, now) => {
                state.failure_count.saturating_add(1)
            }
            _ => 1,
        };
        self.store.put_lockout(
            key,
            LockoutState {
                failure_count,
                last_failure_time: now,
            },
        );
        failure_count
    }

    pub fn check(&self, key: &str, now: DateTime<Utc>) -> LockoutDecision {
        let Some(state) = self.store.lockout(key) else {
            return LockoutDecision::Allowed;
        };
        if self.window_passed(&state, now) {
            self.store.delete_lockout(key);
            return LockoutDecision::Allowed;
        }
        if state.failure_count < self.max_attempts {
            return LockoutDecision::Allowed;
        }

        let remaining = self
            .window
            .checked_sub(&(now - state.last_failure_time))
            .map_or(1, |remaining| remaining.num_seconds().max(1));
        LockoutDecision::Locked {
            retry_after_seconds: u64::try_from(remaining).unwrap_or(1),
        }
    }

    pub fn reset(&self, key: &str) {
        self.store.delete_lockout(key);
    }
}
