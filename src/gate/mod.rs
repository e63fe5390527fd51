//! The access gate: credential checks, lockout, sessions and document access.
//!
//! Per caller session the gate moves through
//! `Unauthenticated -> Authenticated -> (LoggedOut | Expired)`; the only way
//! back to `Authenticated` is a fresh successful [`AccessGate::authenticate`].
//!
//! Every operation holds a per-key lock for its read-then-write sequence on
//! the [`SessionStore`](store::SessionStore), so concurrent requests for one
//! caller session cannot lose updates. Different caller sessions never
//! contend.

pub mod audit;
pub mod documents;
mod locks;
pub mod lockout;
pub mod registry;
pub mod session;
pub mod store;


use chrono::{DateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use std::{fmt, hint::black_box, str::FromStr, sync::Arc};
use tracing::{debug, info, warn};

use self::{
    documents::{Document, DocumentError, DocumentLibrary},
    locks::KeyedLocks,
    lockout::{LockoutDecision, LockoutTracker, DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_ATTEMPTS},
    registry::{AgentRecord, CredentialRegistry},
    session::{SessionManager, SessionToken},
    store::{CallerSession, SessionStore},
};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

pub const MISSING_CREDENTIALS: &str = "Agent ID and Access Key are required";

/// Compared against when the agent id is unknown, so both paths do the same work.
static UNKNOWN_AGENT: Lazy<AgentRecord> = Lazy::new(|| {
    AgentRecord::new(
        "",
        "unknown-agent-placeholder-key",
        "",
        "",
        Vec::<String>::new(),
    )
});

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid agent id or access key")]
    InvalidCredentials,
    #[error("rate limited for {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("authentication required")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("method not supported")]
    MethodNotSupported,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// What the lockout counter is keyed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockoutScope {
    /// One counter per caller session.
    #[default]
    CallerSession,
    /// One counter per client address. Bounds retries from a single address
    /// that keeps opening fresh caller sessions.
    ClientAddress,
}

impl LockoutScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CallerSession => "caller-session",
            Self::ClientAddress => "client-address",
        }
    }
}

impl fmt::Display for LockoutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockoutScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "caller-session" => Ok(Self::CallerSession),
            "client-address" => Ok(Self::ClientAddress),
            other => Err(format!("invalid lockout scope: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GateConfig {
    session_ttl_seconds: i64,
    max_login_attempts: u32,
    lockout_seconds: i64,
    lockout_scope: LockoutScope,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            max_login_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
            lockout_scope: LockoutScope::default(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_login_attempts(mut self, attempts: u32) -> Self {
        self.max_login_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_lockout_seconds(mut self, seconds: i64) -> Self {
        self.lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_scope(mut self, scope: LockoutScope) -> Self {
        self.lockout_scope = scope;
        self
    }

    /// Out-of-range values saturate; session issue then refuses them.
    #[must_use]
    pub fn session_ttl(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.session_ttl_seconds).unwrap_or(TimeDelta::MAX)
    }

    #[must_use]
    pub fn max_login_attempts(&self) -> u32 {
        self.max_login_attempts
    }

    #[must_use]
    pub fn lockout_window(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.lockout_seconds).unwrap_or(TimeDelta::MAX)
    }

    #[must_use]
    pub fn lockout_scope(&self) -> LockoutScope {
        self.lockout_scope
    }
}

/// Transport facts about the caller, bound to the session at issue time.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub addr: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of a successful login. The token travels only in the cookie.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub agent_id: String,
    pub display_name: String,
    pub role: String,
    pub token: SessionToken,
    pub expires_at: DateTime<Utc>,
}

pub struct AccessGate {
    registry: CredentialRegistry,
    lockout: LockoutTracker,
    sessions: SessionManager,
    documents: DocumentLibrary,
    scope: LockoutScope,
    locks: KeyedLocks,
}

fn caller_key(caller: &CallerSession) -> String {
    format!("caller:{}", caller.as_str())
}

impl AccessGate {
    #[must_use]
    pub fn new(
        config: &GateConfig,
        registry: CredentialRegistry,
        store: Arc<dyn SessionStore>,
        documents: DocumentLibrary,
    ) -> Self {
        Self {
            registry,
            lockout: LockoutTracker::new(
                Arc::clone(&store),
                config.max_login_attempts(),
                config.lockout_window(),
            ),
            sessions: SessionManager::new(store, config.session_ttl()),
            documents,
            scope: config.lockout_scope(),
            locks: KeyedLocks::default(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    #[must_use]
    pub fn documents(&self) -> &DocumentLibrary {
        &self.documents
    }

    fn lockout_key(&self, caller: &CallerSession, client: &ClientInfo) -> String {
        match (self.scope, client.addr.as_deref()) {
            (LockoutScope::ClientAddress, Some(addr)) => format!("addr:{addr}"),
            _ => caller_key(caller),
        }
    }

    /// Failed attempts currently counted against this caller.
    #[must_use]
    pub fn failure_count(&self, caller: &CallerSession, client: &ClientInfo) -> u32 {
        self.lockout
            .failure_count(&self.lockout_key(caller, client))
    }

    /// Verify `agent_id`/`access_key` and open a session for `caller`.
    ///
    /// # Errors
    /// - `RateLimited` while the lockout key is locked (the registry is not consulted)
    /// - `InvalidInput` if either field is blank (not counted as a failure)
    /// - `InvalidCredentials` for an unknown id or a wrong key
    /// - `Internal` if no session token could be generated or its expiry
    ///   is out of range
    pub async fn authenticate(
        &self,
        caller: &CallerSession,
        agent_id: &str,
        access_key: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<Authenticated, GateError> {
        let caller_key = caller_key(caller);
        let lockout_key = self.lockout_key(caller, client);
        // Always caller first, then address, so two requests cannot wait on each other.
        let _caller_guard = self.locks.lock(&caller_key).await;
        let _lockout_guard = if lockout_key == caller_key {
            None
        } else {
            Some(self.locks.lock(&lockout_key).await)
        };

        let agent_id = agent_id.trim();
        let access_key = access_key.trim();
        let client_addr = client.addr.as_deref();

        if let LockoutDecision::Locked {
            retry_after_seconds,
        } = self.lockout.check(&lockout_key, now)
        {
            audit::login_rate_limited(agent_id, client_addr, now, retry_after_seconds);
            return Err(GateError::RateLimited {
                retry_after_seconds,
            });
        }

        if agent_id.is_empty() || access_key.is_empty() {
            return Err(GateError::InvalidInput(MISSING_CREDENTIALS));
        }

        let agent = match self.registry.lookup(agent_id) {
            Some(agent) if agent.verify_key(access_key) => agent,
            Some(_) => return Err(self.reject(&lockout_key, agent_id, client_addr, now)),
            None => {
                black_box(UNKNOWN_AGENT.verify_key(access_key));
                return Err(self.reject(&lockout_key, agent_id, client_addr, now));
            }
        };

        self.lockout.reset(&lockout_key);
        let record = self.sessions.issue(caller, agent, now, client)?;
        audit::login_succeeded(agent.id(), client_addr, now);

        Ok(Authenticated {
            agent_id: record.agent_id,
            display_name: record.display_name,
            role: record.role,
            token: record.token,
            expires_at: record.expires_at,
        })
    }

    fn reject(
        &self,
        lockout_key: &str,
        agent_id: &str,
        client_addr: Option<&str>,
        now: DateTime<Utc>,
    ) -> GateError {
        let failures = self.lockout.record_failure(lockout_key, now);
        audit::login_failed(agent_id, client_addr, now, failures);
        GateError::InvalidCredentials
    }

    /// End the caller's session. Revoking an absent session is not an error.
    pub async fn deauthenticate(&self, caller: &CallerSession) {
        let _guard = self.locks.lock(&caller_key(caller)).await;
        if self.sessions.revoke(caller) {
            debug!(?caller, "Session revoked");
        }
    }

    /// Validate the caller's session, then read a whitelisted document.
    ///
    /// # Errors
    /// - `Unauthorized` for a missing caller session, no session, an expired
    ///   session or a token mismatch, without saying which
    /// - `NotFound` for names outside the whitelist and for missing files
    /// - `Internal` for other read failures
    pub async fn authorize_and_fetch(
        &self,
        caller: Option<&CallerSession>,
        presented_token: Option<&str>,
        requested: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<Document, GateError> {
        let caller = caller.ok_or(GateError::Unauthorized)?;

        let record = {
            let _guard = self.locks.lock(&caller_key(caller)).await;
            self.sessions
                .validate(caller, presented_token, now)
                .map_err(|reason| {
                    debug!(?caller, ?reason, "Session rejected");
                    GateError::Unauthorized
                })?
        };

        if let (Some(bound), Some(current)) =
            (record.bound_client_addr.as_deref(), client.addr.as_deref())
        {
            if bound != current {
                warn!(
                    agent_id = %record.agent_id,
                    bound_addr = bound,
                    client_addr = current,
                    "Session presented from a different client address"
                );
            }
        }

        match self.documents.fetch(requested).await {
            Ok(document) => {
                info!(
                    agent_id = %record.agent_id,
                    document = document.name,
                    "Serving document"
                );
                Ok(document)
            }
            Err(DocumentError::NotFound) => Err(GateError::NotFound),
            Err(err) => Err(GateError::Internal(err.into())),
        }
    }
}
