//! Credential registry: the fixed roster of agents allowed through the gate.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::Path,
};
use subtle::ConstantTimeEq;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read agents file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid agents document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate agent id: {0}")]
    DuplicateId(String),
    #[error("agent id must not be empty")]
    EmptyId,
    #[error("agent {0} has an empty access key")]
    EmptyKey(String),
}

/// An authorized principal. Immutable once loaded.
#[derive(Debug)]
pub struct AgentRecord {
    id: String,
    secret_key: SecretString,
    display_name: String,
    role: String,
    permissions: BTreeSet<String>,
}

impl AgentRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        secret_key: impl Into<String>,
        display_name: impl Into<String>,
        role: impl Into<String>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            secret_key: SecretString::from(secret_key.into()),
            display_name: display_name.into(),
            role: role.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Compare a presented access key against the stored secret.
    ///
    /// The comparison time does not depend on the position of the first
    /// mismatching byte.
    #[must_use]
    pub fn verify_key(&self, candidate: &str) -> bool {
        self.secret_key
            .expose_secret()
            .as_bytes()
            .ct_eq(candidate.as_bytes())
            .into()
    }
}

#[derive(Deserialize)]
struct AgentsDocument {
    agents: Vec<AgentEntry>,
}

#[derive(Deserialize)]
struct AgentEntry {
    id: String,
    access_key: String,
    name: String,
    role: String,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Read-only lookup from agent id to [`AgentRecord`].
#[derive(Debug, Default)]
pub struct CredentialRegistry {
    agents: HashMap<String, AgentRecord>,
}

impl CredentialRegistry {
    /// Build a registry from records, enforcing unique, non-empty ids and keys.
    ///
    /// # Errors
    /// Returns an error on a duplicate id, an empty id or an empty key.
    pub fn from_records(
        records: impl IntoIterator<Item = AgentRecord>,
    ) -> Result<Self, RegistryError> {
        let mut agents = HashMap::new();
        for record in records {
            if record.id.trim().is_empty() {
                return Err(RegistryError::EmptyId);
            }
            if record.secret_key.expose_secret().trim().is_empty() {
                return Err(RegistryError::EmptyKey(record.id));
            }
            if agents.contains_key(&record.id) {
                return Err(RegistryError::DuplicateId(record.id));
            }
            agents.insert(record.id.clone(), record);
        }
        Ok(Self { agents })
    }

    /// Parse the `{"agents": [...]}` JSON document.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or a record is invalid.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let document: AgentsDocument = serde_json::from_str(json)?;
        Self::from_records(document.agents.into_iter().map(|entry| {
            AgentRecord::new(
                entry.id,
                entry.access_key,
                entry.name,
                entry.role,
                entry.permissions,
            )
        }))
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn lookup(&self, agent_id: &str) -> Option<&AgentRecord> {
        self.agents.get(agent_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
