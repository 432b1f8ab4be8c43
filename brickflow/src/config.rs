//! Runtime configuration.
//!
//! Configuration is plain serde data with per-field defaults, loaded from JSON
//! and then overridden from `BRICKFLOW_*` environment variables.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Messenger timeouts.
    #[serde(default)]
    pub messenger: MessengerConfig,
    /// Host permission match patterns used by broadcast calls.
    #[serde(default = "default_host_permissions")]
    pub host_permissions: Vec<String>,
    /// OAuth2 settings.
    #[serde(default)]
    pub oauth2: OAuth2Settings,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_host_permissions() -> Vec<String> {
    vec!["<all_urls>".to_string()]
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            messenger: MessengerConfig::default(),
            host_permissions: default_host_permissions(),
            oauth2: OAuth2Settings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse runtime configuration")
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Applies `BRICKFLOW_*` environment overrides.
    pub fn apply_env_overrides(mut self) -> anyhow::Result<Self> {
        if let Ok(value) = std::env::var("BRICKFLOW_CALL_TIMEOUT_MS") {
            self.messenger.call_timeout_ms = value
                .parse()
                .with_context(|| format!("BRICKFLOW_CALL_TIMEOUT_MS is not a number: {value}"))?;
        }
        if let Ok(value) = std::env::var("BRICKFLOW_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Ok(value) = std::env::var("BRICKFLOW_LOG_JSON") {
            self.logging.json = matches!(value.as_str(), "1" | "true" | "yes");
        }
        if let Ok(value) = std::env::var("BRICKFLOW_OAUTH2_REDIRECT_URI") {
            self.oauth2.redirect_uri = value;
        }
        Ok(self)
    }

    /// Sets the host permissions.
    #[must_use]
    pub fn with_host_permissions(mut self, patterns: Vec<String>) -> Self {
        self.host_permissions = patterns;
        self
    }

    /// Sets the messenger call timeout.
    #[must_use]
    pub fn with_call_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.messenger.call_timeout_ms = timeout_ms;
        self
    }
}

/// Messenger timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// How long a caller waits for a reply.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// How long `wait_for_target_ready` polls before giving up.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    /// Delay between readiness polls.
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,
}

fn default_call_timeout_ms() -> u64 {
    5 * 60 * 1000
}

fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_ready_poll_interval_ms() -> u64 {
    50
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
        }
    }
}

impl MessengerConfig {
    /// Gets the call timeout as a Duration.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Gets the readiness timeout as a Duration.
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Gets the readiness poll interval as a Duration.
    #[must_use]
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }
}

/// OAuth2 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Settings {
    /// The extension's reserved redirect URL.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Storage key holding the cached token map.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

fn default_redirect_uri() -> String {
    "https://brickflow.chromiumapp.org/".to_string()
}

fn default_storage_key() -> String {
    crate::integrations::OAUTH2_STORAGE_KEY.to_string()
}

impl Default for OAuth2Settings {
    fn default() -> Self {
        Self {
            redirect_uri: default_redirect_uri(),
            storage_key: default_storage_key(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
