//! Session store capability.
//!
//! All cross-request state (lockout counters and session records) lives behind
//! [`SessionStore`]. The gate only ever talks to the trait, so the in-memory
//! implementation here can be swapped for a cache or a shared store.

use chrono::{DateTime, TimeDelta, Utc};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::interval;
use tracing::debug;

use super::session::{generate_token, SessionToken, TOKEN_ENCODED_LEN};

/// Transport-level conversation id presented by the client on every request.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CallerSession(String);

impl CallerSession {
    /// Mint a fresh, unguessable caller session id.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn generate() -> anyhow::Result<Self> {
        generate_token().map(Self)
    }

    /// Accept a client-presented id only if it has the shape we mint.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let well_formed = value.len() == TOKEN_ENCODED_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        well_formed.then(|| Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CallerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Enough to correlate log lines without handing out the id itself.
        let prefix = self.0.get(..6).unwrap_or_default();
        write!(f, "CallerSession({prefix}..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutState {
    pub failure_count: u32,
    pub last_failure_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub agent_id: String,
    pub display_name: String,
    pub role: String,
    pub permissions: BTreeSet<String>,
    pub token: SessionToken,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub bound_client_addr: Option<String>,
    pub bound_client_agent: Option<String>,
}

/// get/put/delete access to lockout and session state.
///
/// Lockout keys and caller session keys live in separate namespaces.
pub trait SessionStore: Send + Sync {
    fn lockout(&self, key: &str) -> Option<LockoutState>;
    fn put_lockout(&self, key: &str, state: LockoutState);
    fn delete_lockout(&self, key: &str);

    fn session(&self, caller: &CallerSession) -> Option<SessionRecord>;
    fn put_session(&self, caller: &CallerSession, record: SessionRecord);
    fn delete_session(&self, caller: &CallerSession) -> bool;

    /// Drop sessions past expiry and lockouts whose window has elapsed,
    /// whatever their failure count.
    /// Returns the number of entries removed.
    fn purge_expired(&self, now: DateTime<Utc>, lockout_window: TimeDelta) -> usize;
}

#[derive(Default)]
struct Entries {
    lockouts: HashMap<String, LockoutState>,
    sessions: HashMap<CallerSession, SessionRecord>,
}

/// Process-local [`SessionStore`].
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<Entries>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        // Every write is a single map operation, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.entries().sessions.len()
    }

    #[must_use]
    pub fn lockout_count(&self) -> usize {
        self.entries().lockouts.len()
    }
}

impl SessionStore for MemorySessionStore {
    fn lockout(&self, key: &str) -> Option<LockoutState> {
        self.entries().lockouts.get(key).copied()
    }

    fn put_lockout(&self, key: &str, state: LockoutState) {
        self.entries().lockouts.insert(key.to_string(), state);
    }

    fn delete_lockout(&self, key: &str) {
        self.entries().lockouts.remove(key);
    }

    fn session(&self, caller: &CallerSession) -> Option<SessionRecord> {
        self.entries().sessions.get(caller).cloned()
    }

    fn put_session(&self, caller: &CallerSession, record: SessionRecord) {
        self.entries().sessions.insert(caller.clone(), record);
    }

    fn delete_session(&self, caller: &CallerSession) -> bool {
        self.entries().sessions.remove(caller).is_some()
    }

    fn purge_expired(&self, now: DateTime<Utc>, lockout_window: TimeDelta) -> usize {
        let mut entries = self.entries();
        let before = entries.sessions.len() + entries.lockouts.len();
        entries.sessions.retain(|_, record| record.expires_at >= now);
        entries
            .lockouts
            .retain(|_, state| now - state.last_failure_time < lockout_window);
        before - (entries.sessions.len() + entries.lockouts.len())
    }
}

/// Periodically purge expired entries from the store.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, lockout_window: TimeDelta, every: Duration) {
    let mut ticker = interval(every);
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            let removed = store.purge_expired(Utc::now(), lockout_window);
            if removed > 0 {
                debug!("Purged {} expired session store entries", removed);
            }
        }
    });
}
