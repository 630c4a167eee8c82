//! Secrets read from the process environment.
//!
//! Secrets never live in `config.toml`.

use std::fmt;

use crate::error::{ConfigError, CredentialError, SyncError};

pub const NOTION_API_KEY_VAR: &str = "NOTION_API_KEY";
pub const SERVICE_ACCOUNT_KEY_VAR: &str = "GOOGLE_SERVICE_ACCOUNT_KEY";

#[derive(Clone)]
pub struct Secrets {
    /// Notion integration token.
    pub notion_api_key: String,
    /// Service-account key JSON, raw or base64-encoded.
    pub service_account_key: String,
}

impl Secrets {
    /// Read secrets from the process environment.
    ///
    /// # Errors
    /// Fails when either variable is unset or blank.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read secrets through an arbitrary lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let notion_api_key = read(NOTION_API_KEY_VAR)
            .ok_or_else(|| ConfigError::MissingKey(NOTION_API_KEY_VAR.to_string()))?;
        let service_account_key = read(SERVICE_ACCOUNT_KEY_VAR)
            .ok_or_else(|| CredentialError::Missing(SERVICE_ACCOUNT_KEY_VAR.to_string()))?;

        Ok(Self {
            notion_api_key,
            service_account_key,
        })
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("notion_api_key", &"<redacted>")
            .field("service_account_key", &"<redacted>")
            .finish()
    }
}
