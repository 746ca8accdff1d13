//! Bearer token lookup for the backend API
//!
//! The token is looked up fresh on every activation and every fetch, so a
//! token written or removed while the service runs takes effect on the next
//! cycle.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::CredentialConfig;

/// Source of the API bearer token
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// The current token, or `None` when no credential is present
    fn token(&self) -> Option<String>;
}

/// Reads the token from an environment variable
#[derive(Debug)]
pub struct EnvCredentialStore {
    var: String,
}

impl EnvCredentialStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn token(&self) -> Option<String> {
        std::env::var(&self.var).ok().and_then(non_blank)
    }
}

/// Reads the token from a file, trimming surrounding whitespace
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => non_blank(content),
            Err(e) => {
                tracing::debug!("No credential at {:?}: {}", self.path, e);
                None
            }
        }
    }
}

/// A fixed token
#[derive(Debug)]
pub struct StaticCredentialStore {
    token: Option<String>,
}

impl StaticCredentialStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.and_then(non_blank),
        }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Build the credential store described by the configuration
pub fn from_config(config: &CredentialConfig) -> Arc<dyn CredentialStore> {
    match config {
        CredentialConfig::Env { var } => Arc::new(EnvCredentialStore::new(var.clone())),
        CredentialConfig::File { path } => Arc::new(FileCredentialStore::new(path.clone())),
        CredentialConfig::Static { token } => {
            Arc::new(StaticCredentialStore::new(Some(token.clone())))
        }
    }
}
