//! API Credential Lookup
//!
//! The API key is read from the environment each time it is needed and is
//! never cached between calls. Lookups go through [`EnvSource`] so callers
//! can supply a fixed environment instead of the process one.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};

use crate::constants::env;

/// Read-only view of environment variables
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// API key for the completion endpoint
pub struct Credential {
    api_key: SecretString,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
        }
    }

    /// Look up `OPENAI_API_KEY`; blank values count as absent
    pub fn from_env(source: &dyn EnvSource) -> Option<Self> {
        source
            .var(env::API_KEY)
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
    }

    /// Value for the `Authorization: Bearer` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }
}
