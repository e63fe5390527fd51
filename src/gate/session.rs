//! Session issuance, validation and revocation.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, TimeDelta, Utc};
use rand::{rngs::OsRng, RngCore};
use std::{fmt, sync::Arc};
use subtle::ConstantTimeEq;

use super::{
    registry::AgentRecord,
    store::{CallerSession, SessionRecord, SessionStore},
    ClientInfo,
};

const TOKEN_BYTES: usize = 32;

/// Length of an encoded token: 32 bytes as unpadded URL-safe base64.
pub const TOKEN_ENCODED_LEN: usize = 43;

/// Generate 256 bits from the OS random source, encoded as a fixed-width string.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Opaque bearer value bound to a [`SessionRecord`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn generate() -> Result<Self> {
        generate_token().map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a client-presented token.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// Why a session failed validation. Callers must not surface the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidSession {
    NoSession,
    Expired,
    TokenMismatch,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: TimeDelta,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, ttl: TimeDelta) -> Self {
        Self { store, ttl }
    }

    /// Mint a session for `agent` and store it under `caller`, replacing any
    /// previous one.
    ///
    /// # Errors
    /// Returns an error if no token could be generated or the expiry is not
    /// representable.
    pub fn issue(
        &self,
        caller: &CallerSession,
        agent: &AgentRecord,
        now: DateTime<Utc>,
        client: &ClientInfo,
    ) -> Result<SessionRecord> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .with_context(|| format!("Session lifetime {} overflows the expiry time", self.ttl))?;
        let record = SessionRecord {
            agent_id: agent.id().to_string(),
            display_name: agent.display_name().to_string(),
            role: agent.role().to_string(),
            permissions: agent.permissions().clone(),
            token: SessionToken::generate()?,
            created_at: now,
            expires_at,
            bound_client_addr: client.addr.clone(),
            bound_client_agent: client.user_agent.clone(),
        };
        self.store.put_session(caller, record.clone());
        Ok(record)
    }

    /// Check that `caller` holds an unexpired session whose token equals
    /// `presented`. Expired records are removed.
    ///
    /// # Errors
    /// Returns the first failed check.
    pub fn validate(
        &self,
        caller: &CallerSession,
        presented: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, InvalidSession> {
        let record = self
            .store
            .session(caller)
            .ok_or(InvalidSession::NoSession)?;

        if record.expires_at < now {
            self.store.delete_session(caller);
            return Err(InvalidSession::Expired);
        }

        match presented {
            Some(token) if record.token.matches(token) => Ok(record),
            _ => Err(InvalidSession::TokenMismatch),
        }
    }

    /// Remove the session for `caller`; returns whether one existed.
    pub fn revoke(&self, caller: &CallerSession) -> bool {
        self.store.delete_session(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::store::MemorySessionStore;
    use std::collections::HashSet;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemorySessionStore::new()), TimeDelta::hours(24))
    }

    fn agent() -> AgentRecord {
        AgentRecord::new("docs-dev-001", "dev-key", "Development Agent", "development", [
            "read", "test", "debug",
        ])
    }

    fn client() -> ClientInfo {
        ClientInfo {
            addr: Some("203.0.113.7".to_string()),
            user_agent: Some("curl/8.0".to_string()),
        }
    }

    #[test]
    fn generated_tokens_are_fixed_width_base64url() -> Result<()> {
        let token = generate_token()?;
        assert_eq!(token.len(), TOKEN_ENCODED_LEN);
        let decoded = Base64UrlUnpadded::decode_vec(&token)
            .map_err(|err| anyhow::anyhow!("decode failed: {err}"))?;
        assert_eq!(decoded.len(), TOKEN_BYTES);
        Ok(())
    }

    #[test]
    fn issue_binds_identity_and_expiry() -> Result<()> {
        let sessions = manager();
        let caller = CallerSession::generate()?;
        let now = Utc::now();

        let record = sessions.issue(&caller, &agent(), now, &client())?;
        assert_eq!(record.agent_id, "docs-dev-001");
        assert_eq!(record.role, "development");
        assert!(record.permissions.contains("debug"));
        assert_eq!(record.expires_at, now + TimeDelta::hours(24));
        assert!(record.expires_at > record.created_at);
        assert_eq!(record.bound_client_addr.as_deref(), Some("203.0.113.7"));
        assert_eq!(record.bound_client_agent.as_deref(), Some("curl/8.0"));
        Ok(())
    }

    #[test]
    fn issue_rejects_unrepresentable_expiry() -> Result<()> {
        let sessions = SessionManager::new(Arc::new(MemorySessionStore::new()), TimeDelta::MAX);
        let caller = CallerSession::generate()?;

        let result = sessions.issue(&caller, &agent(), Utc::now(), &client());
        assert!(result.is_err());
        assert_eq!(
            sessions.validate(&caller, Some("anything"), Utc::now()).err(),
            Some(InvalidSession::NoSession)
        );
        Ok(())
    }

    #[test]
    fn validate_accepts_matching_token() -> Result<()> {
        let sessions = manager();
        let caller = CallerSession::generate()?;
        let now = Utc::now();
        let record = sessions.issue(&caller, &agent(), now, &client())?;

        let validated = sessions
            .validate(&caller, Some(record.token.as_str()), now + TimeDelta::hours(1))
            .map_err(|reason| anyhow::anyhow!("unexpected {reason:?}"))?;
        assert_eq!(validated.agent_id, record.agent_id);
        Ok(())
    }

    #[test]
    fn validate_reports_each_failure() -> Result<()> {
        let sessions = manager();
        let caller = CallerSession::generate()?;
        let now = Utc::now();

        assert_eq!(
            sessions.validate(&caller, Some("anything"), now).err(),
            Some(InvalidSession::NoSession)
        );

        let record = sessions.issue(&caller, &agent(), now, &client())?;
        assert_eq!(
            sessions.validate(&caller, None, now).err(),
            Some(InvalidSession::TokenMismatch)
        );
        let other = SessionToken::generate()?;
        assert_eq!(
            sessions.validate(&caller, Some(other.as_str()), now).err(),
            Some(InvalidSession::TokenMismatch)
        );

        let later = record.expires_at + TimeDelta::seconds(1);
        assert_eq!(
            sessions
                .validate(&caller, Some(record.token.as_str()), later)
                .err(),
            Some(InvalidSession::Expired)
        );
        // Expired records are gone afterwards.
        assert_eq!(
            sessions
                .validate(&caller, Some(record.token.as_str()), now)
                .err(),
            Some(InvalidSession::NoSession)
        );
        Ok(())
    }

    #[test]
    fn session_is_valid_up_to_its_expiry_instant() -> Result<()> {
        let sessions = manager();
        let caller = CallerSession::generate()?;
        let now = Utc::now();
        let record = sessions.issue(&caller, &agent(), now, &client())?;

        assert!(sessions
            .validate(&caller, Some(record.token.as_str()), record.expires_at)
            .is_ok());
        Ok(())
    }

    #[test]
    fn revoke_is_idempotent() -> Result<()> {
        let sessions = manager();
        let caller = CallerSession::generate()?;
        sessions.issue(&caller, &agent(), Utc::now(), &client())?;

        assert!(sessions.revoke(&caller));
        assert!(!sessions.revoke(&caller));
        Ok(())
    }

    #[test]
    fn token_debug_is_redacted() -> Result<()> {
        let token = SessionToken::generate()?;
        assert!(!format!("{token:?}").contains(token.as_str()));
        Ok(())
    }

    #[test]
    fn ten_thousand_issues_yield_unique_tokens() -> Result<()> {
        let sessions = manager();
        let caller = CallerSession::generate()?;
        let now = Utc::now();
        let agent = agent();
        let client = client();

        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let record = sessions.issue(&caller, &agent, now, &client)?;
            assert!(seen.insert(record.token.as_str().to_string()));
        }
        assert_eq!(seen.len(), 10_000);
        Ok(())
    }
}
