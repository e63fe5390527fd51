//! Whitelisted specification documents.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;

/// The closed set of servable document names.
pub const ALLOWED_DOCUMENTS: [&str; 2] = ["openapi.yaml", "openapi-v2.yaml"];

pub const DOCUMENT_CONTENT_TYPE: &str = "application/x-yaml";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document not found")]
    NotFound,
    #[error("failed to read document {name}: {source}")]
    Io {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Resolves whitelisted names against a documents directory.
#[derive(Debug, Clone)]
pub struct DocumentLibrary {
    root: PathBuf,
}

impl DocumentLibrary {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a requested name onto the whitelist. Only exact matches count.
    #[must_use]
    pub fn allowed(requested: &str) -> Option<&'static str> {
        ALLOWED_DOCUMENTS
            .iter()
            .copied()
            .find(|allowed| *allowed == requested)
    }

    /// Read a whitelisted document.
    ///
    /// # Errors
    /// `NotFound` if the name is not whitelisted or the file is absent, `Io`
    /// for any other read failure.
    pub async fn fetch(&self, requested: &str) -> Result<Document, DocumentError> {
        let name = Self::allowed(requested).ok_or(DocumentError::NotFound)?;
        match fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(Document {
                name,
                content_type: DOCUMENT_CONTENT_TYPE,
                bytes,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(DocumentError::NotFound),
            Err(source) => Err(DocumentError::Io { name, source }),
        }
    }
}
