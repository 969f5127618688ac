//! Configuration management
//!
//! Handles loading and saving the bucket-utils configuration file. The file is
//! stored in TOML format at ~/.config/bucket-utils/config.toml, or wherever
//! `BUCKET_UTILS_CONFIG` points.
//!
//! Credentials never live here; the SDK's own credential chain supplies them.
//!
//! The file is optional. Only `bucket_s3::connect` reads a `Config`; a
//! `BucketClient` can be built directly from a store and a bucket name.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration schema version
///
/// Bumping this version requires a migration step in `ConfigManager::migrate`.
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "BUCKET_UTILS_CONFIG";

/// Largest number of keys a single batched delete may carry (S3 limit)
pub const MAX_DELETE_BATCH: usize = 1000;

/// Largest number of keys a single listing page may return (S3 limit)
pub const MAX_LIST_PAGE: i32 = 1000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Bucket the façade binds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// SDK client settings
    #[serde(default)]
    pub store: StoreSettings,

    /// Batch behaviour of the façade
    #[serde(default)]
    pub transfer: TransferSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            bucket: None,
            store: StoreSettings::default(),
            transfer: TransferSettings::default(),
        }
    }
}

/// Settings handed through to the SDK client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Region override; the SDK default chain is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Use path-style addressing instead of virtual-hosted buckets
    #[serde(default)]
    pub force_path_style: bool,

    /// Named profile from the shared AWS config files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// SDK retry configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// SDK timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

impl StoreSettings {
    /// Check the settings before they reach the SDK
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)?;
        }
        if let Some(retry) = &self.retry {
            if retry.max_attempts == 0 {
                return Err(Error::Config("retry.max_attempts must be at least 1".into()));
            }
        }
        Ok(())
    }
}

/// Retry configuration applied by the SDK
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeout configuration applied by the SDK
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// Batch behaviour of the bucket façade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Keys per batched delete request, clamped to 1..=1000
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,

    /// Whether `upload_files` descends into subdirectories by default
    #[serde(default)]
    pub recursive_upload: bool,

    /// Keys requested per listing page; the provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_page_size: Option<i32>,
}

fn default_delete_batch_size() -> usize {
    MAX_DELETE_BATCH
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            delete_batch_size: default_delete_batch_size(),
            recursive_upload: false,
            list_page_size: None,
        }
    }
}

impl TransferSettings {
    /// Delete batch size within the provider's per-request limit
    pub fn effective_delete_batch_size(&self) -> usize {
        self.delete_batch_size.clamp(1, MAX_DELETE_BATCH)
    }

    /// Listing page size within the provider's per-request limit
    pub fn effective_list_page_size(&self) -> Option<i32> {
        self.list_page_size
            .map(|size| size.clamp(1, MAX_LIST_PAGE))
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(Self::with_path(PathBuf::from(path)));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("bucket-utils").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| Error::local_io(&self.config_path, e))?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.store.validate()?;
        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::local_io(&self.config_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;
        tracing::debug!(
            from = config.schema_version,
            to = SCHEMA_VERSION,
            "migrating config"
        );
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
