//! # Queue Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TETHER_BASE_URL=https://api.example.com                            │
//! │     TETHER_SYNC_INTERVAL_SECS=60                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/outbox/tether.toml (Linux)                               │
//! │     ~/Library/Application Support/com.tether.outbox/tether.toml        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [queue]
//! storage_key = "offline-queue"
//! item_delay_ms = 100
//! periodic_interval_secs = 300
//! sync_on_enqueue = true
//! start_online = true
//! drop_permanent_failures = false
//!
//! [transport]
//! base_url = "https://api.example.com"
//! timeout_secs = 30
//!
//! [transport.default_headers]
//! X-Client = "tether"
//!
//! [storage]
//! database_path = "/var/lib/tether/tether.db"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{QueueResult, SyncError};

// =============================================================================
// Queue Settings
// =============================================================================

/// Drain behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Key the snapshot is stored under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Pause between records within one pass (milliseconds).
    #[serde(default = "default_item_delay")]
    pub item_delay_ms: u64,

    /// Safety-net drain interval (seconds).
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_secs: u64,

    /// Request a drain right after enqueue when online.
    #[serde(default = "default_true")]
    pub sync_on_enqueue: bool,

    /// Connectivity assumed before the first signal arrives.
    #[serde(default = "default_true")]
    pub start_online: bool,

    /// Drop a record on its first 4xx-equivalent failure instead of
    /// spending its retry budget.
    #[serde(default)]
    pub drop_permanent_failures: bool,
}

fn default_storage_key() -> String {
    "offline-queue".to_string()
}

fn default_item_delay() -> u64 {
    100
}

fn default_periodic_interval() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            storage_key: default_storage_key(),
            item_delay_ms: default_item_delay(),
            periodic_interval_secs: default_periodic_interval(),
            sync_on_enqueue: true,
            start_online: true,
            drop_permanent_failures: false,
        }
    }
}

// =============================================================================
// Transport Settings
// =============================================================================

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Relative targets resolve against this URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-call timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Headers sent with every call, below provider and record headers.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

fn default_timeout() -> u64 {
    30
}

impl Default for TransportSettings {
    fn default() -> Self {
        TransportSettings {
            base_url: None,
            timeout_secs: default_timeout(),
            default_headers: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Queue Configuration
// =============================================================================

/// Complete queue configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub transport: TransportSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tether.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> QueueResult<Self> {
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

        config.apply_env_overrides();
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
    pub fn save(&self, config_path: Option<PathBuf>) -> QueueResult<()> {
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
    pub fn validate(&self) -> QueueResult<()> {
        if self.queue.storage_key.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "storage_key must not be empty".into(),
            ));
        }

        if let Some(ref base) = self.transport.base_url {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(SyncError::InvalidUrl(format!(
                    "Base URL must start with http:// or https://, got: {}",
                    base
                )));
            }
            url::Url::parse(base)?;
        }

        if self.queue.periodic_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "periodic_interval_secs must be greater than 0".into(),
            ));
        }

        if self.transport.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `TETHER_*` overrides read through `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TETHER_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.transport.base_url = Some(url);
        }

        if let Some(path) = lookup("TETHER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(secs) = lookup("TETHER_SYNC_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.queue.periodic_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid TETHER_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(ms) = lookup("TETHER_ITEM_DELAY_MS") {
            match ms.parse::<u64>() {
                Ok(m) => self.queue.item_delay_ms = m,
                Err(_) => warn!(value = %ms, "Ignoring invalid TETHER_ITEM_DELAY_MS"),
            }
        }

        if let Some(secs) = lookup("TETHER_TRANSPORT_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.transport.timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid TETHER_TRANSPORT_TIMEOUT_SECS"),
            }
        }

        if let Some(flag) = lookup("TETHER_DROP_PERMANENT_FAILURES") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.queue.drop_permanent_failures = true,
                "0" | "false" | "no" => self.queue.drop_permanent_failures = false,
                _ => warn!(value = %flag, "Unknown TETHER_DROP_PERMANENT_FAILURES value"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "tether", "outbox")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("tether.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Database file to open: configured path, else the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(|| {
            Self::project_dirs().map(|dirs| dirs.data_dir().join("tether.db"))
        })
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.queue.item_delay_ms)
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.queue.periodic_interval_secs)
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.timeout_secs)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.transport.base_url.as_deref()
    }
}
