//! Configuration file handling.
//!
//! This module provides loading and saving of sslcheck configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/sslcheck/config.toml`
//! - macOS: `~/Library/Application Support/sslcheck/config.toml`
//! - Windows: `%APPDATA%\sslcheck\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! api_url = "https://api.ssllabs.com/api/v3/analyze"
//! poll_interval_secs = 10
//! rate_limit_backoff_secs = 30
//! query_wait_secs = 2
//! request_timeout_secs = 30
//! store_path = "/var/lib/sslcheck/scans_db.json"
//! enrich_geo = false
//! geo_api_url = "http://ip-api.com/json"
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{DEFAULT_API_URL, DEFAULT_GEO_API_URL};
use crate::platform;
use crate::scan::{ScanPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_RATE_LIMIT_BACKOFF};

/// Application configuration.
///
/// Every field has a default, so a config file only needs the values it
/// wants to change.
///
/// # Example
///
/// ```no_run
/// use sslcheck::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Polling every {}s", config.poll_interval_secs);
/// println!("Results stored at {}", config.store_path().display());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SSL Labs analyze endpoint.
    pub api_url: String,

    /// Seconds between two polls of a running analysis.
    ///
    /// Default: 10
    pub poll_interval_secs: u64,

    /// Seconds to wait after SSL Labs answers 429 or 529.
    ///
    /// Default: 30
    pub rate_limit_backoff_secs: u64,

    /// How long a query waits for the first result before answering
    /// from the cache.
    ///
    /// Default: 2
    pub query_wait_secs: u64,

    /// Timeout of a single HTTP request to SSL Labs.
    ///
    /// Default: 30
    pub request_timeout_secs: u64,

    /// Where scan results are persisted. Defaults to the platform data
    /// directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Look up the location of every endpoint address after a scan.
    ///
    /// Default: false
    pub enrich_geo: bool,

    /// Geolocation service used when `enrich_geo` is set.
    pub geo_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            rate_limit_backoff_secs: DEFAULT_RATE_LIMIT_BACKOFF.as_secs(),
            query_wait_secs: 2,
            request_timeout_secs: 30,
            store_path: None,
            enrich_geo: false,
            geo_api_url: DEFAULT_GEO_API_URL.to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use sslcheck::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Effective location of the persisted scan results.
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(platform::default_store_path)
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        ScanPolicy {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            rate_limit_backoff: Duration::from_secs(self.rate_limit_backoff_secs),
        }
    }

    pub fn query_wait(&self) -> Duration {
        Duration::from_secs(self.query_wait_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
