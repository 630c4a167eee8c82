//! Core error types for tasksync-core.
//!
//! `SyncError` is the single error surfaced by the reconciliation pipeline.
//! Its variants split into two groups: fatal errors that abort a whole run
//! (bad credentials, rejected token exchange, failed task query) and per-task
//! errors that only skip the task they occurred in.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for the reconciliation pipeline.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Service-account key is missing or malformed.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Token endpoint rejected the signed assertion.
    #[error("Token exchange failed: {status} {body}")]
    AuthExchange { status: u16, body: String },

    /// Calendar API answered 403 with reason `rateLimitExceeded`.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Any other non-success answer from an API.
    #[error("Google API request failed: {status} {body}")]
    ApiRequest { status: u16, body: String },

    /// The initial task query failed.
    #[error("Record store query failed: {0}")]
    RecordFetch(String),

    /// Writing the event id back to a record failed.
    #[error("Record store update failed for page {page_id}: {status} {body}")]
    RecordPatch {
        page_id: String,
        status: u16,
        body: String,
    },

    /// Connection, timeout or body-read failure below the HTTP layer.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Whether this error must abort the whole run instead of a single task.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Credential(_)
                | SyncError::AuthExchange { .. }
                | SyncError::RecordFetch(_)
                | SyncError::Config(_)
        )
    }

    /// Whether the backoff loop may retry the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::RateLimit(_))
    }
}

/// Service-account credential errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// No credential bundle was provided at all
    #[error("{0} is not set")]
    Missing(String),

    /// Bundle is not valid JSON (or base64 of JSON)
    #[error("Failed to parse service account key: {0}")]
    Malformed(String),

    /// Bundle parsed but a required field is empty
    #[error("Invalid service account key format: missing {0}")]
    MissingField(&'static str),

    /// Private key could not be loaded or used for signing
    #[error("Failed to sign assertion: {0}")]
    Signing(String),
}

/// Transport-level errors (no HTTP status available).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Request did not complete within the configured timeout
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Connection refused, DNS failure, TLS failure, ...
    #[error("request to {url} failed: {message}")]
    Connect { url: String, message: String },

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for SyncError
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(SyncError::Credential(CredentialError::MissingField("private_key")).is_fatal());
        assert!(SyncError::AuthExchange {
            status: 400,
            body: "invalid_grant".into()
        }
        .is_fatal());
        assert!(SyncError::RecordFetch("boom".into()).is_fatal());

        assert!(!SyncError::RateLimit("slow down".into()).is_fatal());
        assert!(!SyncError::ApiRequest {
            status: 404,
            body: String::new()
        }
        .is_fatal());
        assert!(!SyncError::RecordPatch {
            page_id: "p".into(),
            status: 500,
            body: String::new()
        }
        .is_fatal());
    }

    #[test]
    fn only_rate_limit_is_retryable() {
        assert!(SyncError::RateLimit("x".into()).is_retryable());
        assert!(!SyncError::ApiRequest {
            status: 403,
            body: "forbidden".into()
        }
        .is_retryable());
        assert!(!SyncError::Transport(TransportError::Timeout { url: "u".into() }).is_retryable());
    }

    #[test]
    fn messages_carry_status_and_body() {
        let err = SyncError::AuthExchange {
            status: 401,
            body: "{\"error\":\"invalid_client\"}".into(),
        };
        assert_eq!(
            err.to_string(),
            "Token exchange failed: 401 {\"error\":\"invalid_client\"}"
        );

        let err = SyncError::Credential(CredentialError::Missing(
            "GOOGLE_SERVICE_ACCOUNT_KEY".into(),
        ));
        assert_eq!(
            err.to_string(),
            "Credential error: GOOGLE_SERVICE_ACCOUNT_KEY is not set"
        );
    }
}
