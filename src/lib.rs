//! # Docgate (session-gated specification documents)
//!
//! `docgate` sits in front of a small, fixed set of API specification
//! documents. Callers authenticate with an agent id and a shared access key,
//! receive a time-bounded session, and may then fetch whitelisted documents
//! for as long as that session stays valid.
//!
//! ## Agents
//!
//! The roster of agents is loaded once at startup from a JSON file and never
//! changes while the process runs. Access keys are compared in constant time.
//!
//! ## Lockout
//!
//! Five consecutive failed logins within fifteen minutes lock the caller out
//! until the window elapses. By default the counter is scoped to the caller's
//! browsing session; `--lockout-scope client-address` scopes it to the client
//! address instead.
//!
//! ## Documents
//!
//! Only the names in [`gate::documents::ALLOWED_DOCUMENTS`] are ever served.
//! Anything else, including path traversal attempts, returns `404 Not Found`
//! so that disallowed and missing files are indistinguishable.

pub mod api;
pub mod cli;
pub mod gate;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
