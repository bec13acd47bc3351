//! Runtime configuration for the market relay
//!
//! Every field has a default from `constants`, so an empty TOML file (or no
//! file at all) yields a working configuration:
//!
//! ```toml
//! api_base_url = "https://nwmarketprices.com"
//! refresh_interval_secs = 900
//! request_timeout_secs = 10
//! listing_attempts = 3
//! listing_backoff_secs = 10
//! item_catalog_path = "item_list.json"
//!
//! [servers]
//! delos = 9
//! "el dorado" = 2
//! ```

use crate::{
    constants::{
        API_URL_ENV, CONFIG_PATH_ENV, DEFAULT_API_BASE_URL, DEFAULT_SERVERS,
        LISTING_FETCH_ATTEMPTS, LISTING_RETRY_BACKOFF_SECS, REFRESH_INTERVAL_SECS,
        REFRESH_SECS_ENV, REQUEST_TIMEOUT_SECS,
    },
    error::ConfigError,
    retry::RetryPolicy,
    servers::ServerDirectory,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the price service
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Seconds between refresh cycles
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per listing fetch
    #[serde(default = "default_listing_attempts")]
    pub listing_attempts: u32,

    /// Seconds to wait between listing attempts
    #[serde(default = "default_listing_backoff_secs")]
    pub listing_backoff_secs: u64,

    /// Known servers, display name to id
    #[serde(default = "default_servers")]
    pub servers: BTreeMap<String, u32>,

    /// JSON item catalog used for price history lookups
    #[serde(default)]
    pub item_catalog_path: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_refresh_interval_secs() -> u64 {
    REFRESH_INTERVAL_SECS
}

fn default_request_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_listing_attempts() -> u32 {
    LISTING_FETCH_ATTEMPTS
}

fn default_listing_backoff_secs() -> u64 {
    LISTING_RETRY_BACKOFF_SECS
}

fn default_servers() -> BTreeMap<String, u32> {
    DEFAULT_SERVERS
        .iter()
        .map(|(name, id)| (name.to_string(), *id))
        .collect()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            refresh_interval_secs: default_refresh_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            listing_attempts: default_listing_attempts(),
            listing_backoff_secs: default_listing_backoff_secs(),
            servers: default_servers(),
            item_catalog_path: None,
        }
    }
}

impl RelayConfig {
    /// Parses configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&content)
    }

    /// Loads the file named by `MARKET_RELAY_CONFIG` (or defaults), then
    /// applies environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `MARKET_RELAY_API_URL` and `MARKET_RELAY_REFRESH_SECS`
    ///
    /// Takes the variable lookup as a function so tests do not have to touch
    /// the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV) {
            self.api_base_url = url;
        }
        if let Some(secs) = lookup(REFRESH_SECS_ENV) {
            self.refresh_interval_secs = secs.trim().parse().map_err(|_| {
                ConfigError::invalid("refresh_interval_secs", format!("{:?} is not a number", secs))
            })?;
        }
        Ok(())
    }

    /// Rejects values the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::invalid("api_base_url", "must not be empty"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::invalid("refresh_interval_secs", "must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "must be positive"));
        }
        if self.listing_attempts == 0 {
            return Err(ConfigError::invalid("listing_attempts", "must be at least 1"));
        }
        self.server_directory().map(|_| ())
    }

    /// Builds the server directory from the `servers` table
    pub fn server_directory(&self) -> Result<ServerDirectory, ConfigError> {
        ServerDirectory::from_pairs(self.servers.iter().map(|(name, id)| (name.as_str(), *id)))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listing_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.listing_attempts,
            Duration::from_secs(self.listing_backoff_secs),
        )
    }
}
