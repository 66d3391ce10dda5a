//! # Queue Configuration
//!
//! Configuration for the client-side sale queue.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MEDTILL_DEVICE_ID=abc-123                                          │
//! │     MEDTILL_SERVER_URL=https://till.example.com/                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/register/queue.toml (Linux)                              │
//! │     ~/Library/Application Support/com.medtill.register/queue.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated device_id, 5 attempts, 500ms initial backoff        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # queue.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Front desk"
//!
//! [server]
//! url = "https://till.example.com/"
//! request_timeout_secs = 10
//!
//! [queue]
//! max_attempts = 5
//! initial_backoff_ms = 500
//! max_backoff_ms = 30000
//! drain_interval_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::drainer::RetryPolicy;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Identifies this register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (auto-generated if not set).
    #[serde(default = "default_device_id")]
    pub id: String,

    /// Human-readable device name.
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_device_name() -> String {
    "Register".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: default_device_id(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Where sales are committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL of the register server. `None` keeps every sale queued.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-request timeout. A timed-out commit is treated as uncertain.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for the connectivity probe.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    2
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            url: None,
            request_timeout_secs: default_request_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

// =============================================================================
// Queue Settings
// =============================================================================

/// Replay behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Local queue database. Defaults to the platform data dir.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Attempts before an entry is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Retry delay cap in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Growth factor between retries.
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,

    /// Interval between background drains.
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,

    /// Committed entries older than this are removed by cleanup.
    #[serde(default = "default_retain_committed_days")]
    pub retain_committed_days: u32,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_drain_interval() -> u64 {
    30
}

fn default_retain_committed_days() -> u32 {
    7
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            database_path: None,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_multiplier(),
            drain_interval_secs: default_drain_interval(),
            retain_committed_days: default_retain_committed_days(),
        }
    }
}

// =============================================================================
// Main Queue Configuration
// =============================================================================

/// Complete queue configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Device-specific configuration.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Server settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Replay settings.
    #[serde(default)]
    pub queue: QueueSettings,
}

impl QueueConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (queue.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading queue config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load queue config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Queue config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        if let Some(ref raw) = self.server.url {
            let url = url::Url::parse(raw)?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(SyncError::InvalidUrl(format!(
                    "Server URL must start with http:// or https://, got: {}",
                    raw
                )));
            }
        }

        if self.queue.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "max_attempts must be greater than 0".into(),
            ));
        }

        if self.queue.initial_backoff_ms == 0
            || self.queue.max_backoff_ms < self.queue.initial_backoff_ms
        {
            return Err(SyncError::InvalidConfig(
                "backoff must satisfy 0 < initial_backoff_ms <= max_backoff_ms".into(),
            ));
        }

        if self.queue.backoff_multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(
                "backoff_multiplier must be at least 1.0".into(),
            ));
        }

        if self.queue.drain_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "drain_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies overrides from a variable lookup (the process environment
    /// in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("MEDTILL_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = lookup("MEDTILL_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(url) = lookup("MEDTILL_SERVER_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.url = Some(url);
        }

        if let Some(path) = lookup("MEDTILL_QUEUE_DB") {
            self.queue.database_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup("MEDTILL_QUEUE_MAX_ATTEMPTS") {
            match raw.parse::<u32>() {
                Ok(n) => self.queue.max_attempts = n,
                Err(_) => warn!(value = %raw, "Ignoring invalid MEDTILL_QUEUE_MAX_ATTEMPTS"),
            }
        }

        if let Some(raw) = lookup("MEDTILL_QUEUE_DRAIN_INTERVAL_SECS") {
            match raw.parse::<u64>() {
                Ok(n) => self.queue.drain_interval_secs = n,
                Err(_) => warn!(value = %raw, "Ignoring invalid MEDTILL_QUEUE_DRAIN_INTERVAL_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "medtill", "register")
            .map(|dirs| dirs.config_dir().join("queue.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns the server URL if configured.
    pub fn server_url(&self) -> Option<&str> {
        self.server.url.as_deref()
    }

    /// Local queue database path: configured, else the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.queue.database_path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "medtill", "register")
                .map(|dirs| dirs.data_dir().join("queue.db"))
        })
    }

    /// Request timeout for the HTTP submitter.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Timeout for the connectivity probe.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.server.probe_timeout_secs)
    }

    /// Interval between background drains.
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.queue.drain_interval_secs)
    }

    /// Retry policy for the drainer.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.queue.max_attempts,
            initial_backoff: Duration::from_millis(self.queue.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.queue.max_backoff_ms),
            multiplier: self.queue.backoff_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert!(!config.device.id.is_empty());
        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.queue.initial_backoff_ms, 500);
        assert_eq!(config.queue.max_backoff_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: QueueConfig = toml::from_str(
            r#"
            [device]
            id = "front-desk"

            [queue]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.device.id, "front-desk");
        assert_eq!(config.device.name, "Register");
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.initial_backoff_ms, 500);
        assert!(config.server.url.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = QueueConfig::default();

        config.device.id = String::new();
        assert!(matches!(config.validate(), Err(SyncError::MissingDeviceId)));

        config.device.id = "dev".into();
        config.server.url = Some("ws://till.local".into());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.server.url = Some("not a url".into());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.server.url = Some("https://till.local/".into());
        assert!(config.validate().is_ok());

        config.queue.max_attempts = 0;
        assert!(config.validate().unwrap_err().is_config_error());

        config.queue.max_attempts = 5;
        config.queue.max_backoff_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MEDTILL_DEVICE_ID", "env-device"),
            ("MEDTILL_SERVER_URL", "http://localhost:8080/"),
            ("MEDTILL_QUEUE_MAX_ATTEMPTS", "9"),
            ("MEDTILL_QUEUE_DRAIN_INTERVAL_SECS", "soon"),
        ]
        .into_iter()
        .collect();

        let mut config = QueueConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.device_id(), "env-device");
        assert_eq!(config.server_url(), Some("http://localhost:8080/"));
        assert_eq!(config.queue.max_attempts, 9);
        // Unparseable values are ignored
        assert_eq!(config.queue.drain_interval_secs, 30);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.toml");

        let mut config = QueueConfig::default();
        config.device.id = "saved-device".into();
        config.server.url = Some("https://till.local/".into());
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[device]"));
        assert!(contents.contains("[queue]"));

        let loaded: QueueConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.device.id, "saved-device");
        assert_eq!(loaded.server_url(), Some("https://till.local/"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = QueueConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
        assert_eq!(policy.max_backoff, Duration::from_secs(30));
    }
}
