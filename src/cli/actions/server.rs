use crate::{
    api::{self, ApiConfig},
    gate::{
        documents::DocumentLibrary,
        registry::CredentialRegistry,
        store::{spawn_sweeper, MemorySessionStore, SessionStore},
        AccessGate, GateConfig, LockoutScope,
    },
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub agents_file: String,
    pub docs_dir: String,
    pub public_url: String,
    pub trust_forwarded_headers: bool,
    pub session_ttl_seconds: i64,
    pub max_login_attempts: u32,
    pub lockout_seconds: i64,
    pub lockout_scope: LockoutScope,
    pub sweep_interval_seconds: u64,
}

/// Load the agent roster and wire the gate around `store`.
fn build_gate(args: &Args, store: Arc<dyn SessionStore>) -> Result<(AccessGate, GateConfig)> {
    let registry = CredentialRegistry::from_file(&args.agents_file)
        .with_context(|| format!("Failed to load agents from {}", args.agents_file))?;
    if registry.is_empty() {
        warn!("No agents configured in {}; every login will fail", args.agents_file);
    }
    info!("Loaded {} agent(s) from {}", registry.len(), args.agents_file);

    let documents = DocumentLibrary::new(&args.docs_dir);
    debug!("Serving documents from {}", documents.root().display());

    let config = GateConfig::new()
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_max_login_attempts(args.max_login_attempts)
        .with_lockout_seconds(args.lockout_seconds)
        .with_lockout_scope(args.lockout_scope);

    Ok((AccessGate::new(&config, registry, store, documents), config))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the agents file cannot be loaded, the public URL is
/// invalid, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let api_config = ApiConfig::new(&args.public_url)?
        .with_trust_forwarded_headers(args.trust_forwarded_headers);

    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let (gate, config) = build_gate(&args, Arc::clone(&store))?;

    debug!(
        lockout_scope = %config.lockout_scope(),
        max_login_attempts = config.max_login_attempts(),
        "Gate configured"
    );

    spawn_sweeper(
        store,
        config.lockout_window(),
        Duration::from_secs(args.sweep_interval_seconds),
    );

    api::new(args.port, Arc::new(gate), api_config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::documents::test_support::DocsDir;

    fn args(agents_file: String, docs_dir: String) -> Args {
        Args {
            port: 8080,
            agents_file,
            docs_dir,
            public_url: "https://localhost".to_string(),
            trust_forwarded_headers: false,
            session_ttl_seconds: 3600,
            max_login_attempts: 3,
            lockout_seconds: 60,
            lockout_scope: LockoutScope::ClientAddress,
            sweep_interval_seconds: 60,
        }
    }

    #[test]
    fn build_gate_loads_agents_and_config() -> Result<()> {
        let dir = DocsDir::new(&[(
            "agents.json",
            r#"{"agents":[{"id":"docs-agent-001","access_key":"k","name":"Primary","role":"production","permissions":["read"]}]}"#,
        )])?;
        let agents_file = dir.path().join("agents.json").display().to_string();
        let docs_dir = dir.path().display().to_string();

        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let (gate, config) = build_gate(&args(agents_file, docs_dir), store)?;

        assert_eq!(gate.registry().len(), 1);
        assert!(gate.registry().lookup("docs-agent-001").is_some());
        assert_eq!(gate.documents().root(), dir.path());
        assert_eq!(config.max_login_attempts(), 3);
        assert_eq!(config.lockout_window().num_seconds(), 60);
        assert_eq!(config.session_ttl().num_seconds(), 3600);
        assert_eq!(config.lockout_scope(), LockoutScope::ClientAddress);
        Ok(())
    }

    #[test]
    fn missing_agents_file_is_an_error() -> Result<()> {
        let dir = DocsDir::new(&[])?;
        let agents_file = dir.path().join("absent.json").display().to_string();
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

        let result = build_gate(&args(agents_file, ".".to_string()), store);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("Failed to load agents"));
        }
        Ok(())
    }
}
