//! TOML-based application configuration.
//!
//! Stores non-secret settings:
//! - Target calendar and Google endpoints
//! - Notion database and property names
//! - Retry, batching and token-cache policy
//! - Trigger settings for the CLI
//!
//! Configuration is stored at `~/.config/tasksync/config.toml`.
//! Secrets are read from the environment, see [`super::Secrets`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::sync::dispatch::FixedWindow;
use crate::sync::retry::RetryPolicy;

pub const DATABASE_ID_VAR: &str = "NOTION_TASKS_DATABASE_ID";
pub const CALENDAR_ID_VAR: &str = "GOOGLE_CALENDAR_ID";

/// Upper bound for `auth.refresh_margin_secs`; tokens live an hour.
pub const MAX_REFRESH_MARGIN_SECS: u64 = 3600;

/// Google Calendar and OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub calendar_id: String,
    #[serde(default = "default_calendar_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_calendar_scope")]
    pub scope: String,
}

/// Names of the Notion database properties the sync reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyNames {
    #[serde(default = "default_name_property")]
    pub name: String,
    #[serde(default = "default_date_property")]
    pub date: String,
    #[serde(default = "default_status_property")]
    pub status: String,
    #[serde(default = "default_event_id_property")]
    pub event_id: String,
    #[serde(default = "default_last_update_property")]
    pub last_update_at: String,
    #[serde(default = "default_location_property")]
    pub location: String,
}

/// Notion record-store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]
    pub database_id: String,
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
    #[serde(default = "default_notion_version")]
    pub version: String,
    #[serde(default)]
    pub properties: PropertyNames,
}

/// Backoff policy for rate-limited Calendar calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
}

/// Window size and pause between windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

/// Access-token handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Reuse a token until shortly before it expires. When false, every
    /// Calendar call performs a fresh token exchange.
    #[serde(default = "default_true")]
    pub cache_tokens: bool,
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for the `watch` and `serve` triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/tasksync/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

// Default functions
fn default_calendar_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".into()
}
fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".into()
}
fn default_calendar_scope() -> String {
    "https://www.googleapis.com/auth/calendar".into()
}
fn default_notion_api_base() -> String {
    "https://api.notion.com/v1".into()
}
fn default_notion_version() -> String {
    "2022-06-28".into()
}
fn default_name_property() -> String {
    "Name".into()
}
fn default_date_property() -> String {
    "Date".into()
}
fn default_status_property() -> String {
    "Status".into()
}
fn default_event_id_property() -> String {
    "Event ID".into()
}
fn default_last_update_property() -> String {
    "Last Update At".into()
}
fn default_location_property() -> String {
    "Location".into()
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_backoff_multiplier() -> u32 {
    2
}
fn default_batch_size() -> usize {
    5
}
fn default_pause_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_refresh_margin_secs() -> u64 {
    60
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_interval_secs() -> u64 {
    300
}
fn default_bind() -> String {
    "127.0.0.1:8787".into()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            calendar_id: String::new(),
            api_base: default_calendar_api_base(),
            token_url: default_token_url(),
            scope: default_calendar_scope(),
        }
    }
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            name: default_name_property(),
            date: default_date_property(),
            status: default_status_property(),
            event_id: default_event_id_property(),
            last_update_at: default_last_update_property(),
            location: default_location_property(),
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            database_id: String::new(),
            api_base: default_notion_api_base(),
            version: default_notion_version(),
            properties: PropertyNames::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pause_ms: default_pause_ms(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cache_tokens: true,
            refresh_margin_secs: default_refresh_margin_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            bind: default_bind(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".into(),
        };
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(format!("cannot parse '{value}' as bool: {e}")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|e| invalid(format!("cannot parse '{value}' as number: {e}")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Override ids from `NOTION_TASKS_DATABASE_ID` / `GOOGLE_CALENDAR_ID`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(DATABASE_ID_VAR).filter(|v| !v.is_empty()) {
            self.notion.database_id = id;
        }
        if let Some(id) = lookup(CALENDAR_ID_VAR).filter(|v| !v.is_empty()) {
            self.google.calendar_id = id;
        }
    }

    /// Check everything a run needs before any network traffic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.google.calendar_id.is_empty() {
            return Err(ConfigError::MissingKey("google.calendar_id".into()));
        }
        if self.notion.database_id.is_empty() {
            return Err(ConfigError::MissingKey("notion.database_id".into()));
        }
        for (key, value) in [
            ("google.api_base", &self.google.api_base),
            ("google.token_url", &self.google.token_url),
            ("notion.api_base", &self.notion.api_base),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
                key: key.into(),
                message: e.to_string(),
            })?;
        }
        if self.dispatch.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "dispatch.batch_size".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.retry.backoff_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.backoff_multiplier".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "http.timeout_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        self.refresh_margin()?;
        Ok(())
    }

    /// How long before expiry a cached token is refreshed.
    ///
    /// # Errors
    /// `InvalidValue` above [`MAX_REFRESH_MARGIN_SECS`].
    pub fn refresh_margin(&self) -> Result<chrono::Duration, ConfigError> {
        let secs = self.auth.refresh_margin_secs;
        let invalid = || ConfigError::InvalidValue {
            key: "auth.refresh_margin_secs".into(),
            message: format!("must be at most {MAX_REFRESH_MARGIN_SECS}"),
        };
        if secs > MAX_REFRESH_MARGIN_SECS {
            return Err(invalid());
        }
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(invalid)
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Does not persist; call [`Config::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self =
            serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            multiplier: self.retry.backoff_multiplier,
        }
    }

    pub fn fixed_window(&self) -> FixedWindow {
        FixedWindow::new(
            self.dispatch.batch_size,
            Duration::from_millis(self.dispatch.pause_ms),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
