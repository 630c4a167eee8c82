mod secrets;
mod settings;

pub use secrets::{Secrets, NOTION_API_KEY_VAR, SERVICE_ACCOUNT_KEY_VAR};
pub use settings::{
    AuthConfig, Config, DispatchConfig, GoogleConfig, HttpConfig, NotionConfig, PropertyNames,
    RetryConfig, TriggerConfig, CALENDAR_ID_VAR, DATABASE_ID_VAR, MAX_REFRESH_MARGIN_SECS,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/tasksync[-dev]/` based on TASKSYNC_ENV.
///
/// Set TASKSYNC_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TASKSYNC_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tasksync-dev")
    } else {
        base_dir.join("tasksync")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
