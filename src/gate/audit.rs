//! Authentication audit trail.
//!
//! Events go to the `docgate::audit` target so they can be routed separately
//! with `RUST_LOG`. Access keys are never part of an event.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

pub const AUDIT_TARGET: &str = "docgate::audit";

pub fn login_succeeded(agent_id: &str, client_addr: Option<&str>, at: DateTime<Utc>) {
    info!(
        target: AUDIT_TARGET,
        outcome = "success",
        agent_id,
        client_addr = client_addr.unwrap_or("unknown"),
        at = %at.to_rfc3339(),
        "Successful login"
    );
}

/// `agent_id` is whatever the caller typed, so it is logged escaped.
pub fn login_failed(agent_id: &str, client_addr: Option<&str>, at: DateTime<Utc>, failures: u32) {
    warn!(
        target: AUDIT_TARGET,
        outcome = "failure",
        agent_id = ?agent_id,
        client_addr = client_addr.unwrap_or("unknown"),
        at = %at.to_rfc3339(),
        failures,
        "Failed login attempt"
    );
}

pub fn login_rate_limited(
    agent_id: &str,
    client_addr: Option<&str>,
    at: DateTime<Utc>,
    retry_after_seconds: u64,
) {
    warn!(
        target: AUDIT_TARGET,
        outcome = "rate_limited",
        agent_id = ?agent_id,
        client_addr = client_addr.unwrap_or("unknown"),
        at = %at.to_rfc3339(),
        retry_after_seconds,
        "Login attempt while locked out"
    );
}
