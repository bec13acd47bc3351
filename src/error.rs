//! Error types for the market relay

use crate::types::ServerId;
use thiserror::Error;

/// Errors that can occur when talking to the remote price service
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed (connect, DNS, body read)
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// The service answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,

    /// Malformed JSON or a missing/ill-typed field
    #[error("Invalid response: {0}")]
    Parse(String),

    /// Every attempt of a retried fetch failed
    #[error("Gave up after {attempts} attempts: {last_error}")]
    FetchExhausted { attempts: u32, last_error: String },
}

impl ProviderError {
    /// Creates a Parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// True for the transport class: network failure, bad status or timeout
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::HttpStatus { .. } | Self::Timeout
        )
    }

    /// Whether another attempt of the same request could succeed
    ///
    /// Transport failures are retried; a body that does not parse will not
    /// parse any better the second time.
    pub fn is_retryable(&self) -> bool {
        self.is_transport()
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err)
        }
    }
}

/// Errors returned to presentation code by price lookups
///
/// Every variant is an expected, user-correctable outcome and maps to its
/// own user-facing message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PriceError {
    /// The server name is not in the configured directory
    #[error("Unknown server: {server}")]
    UnknownServer { server: String },

    /// The server is known but no listing has been fetched yet
    #[error("Price data not available yet for server {server_id}")]
    NotAvailable { server_id: ServerId },

    /// The server's listing has no item with this name
    #[error("Item not found on server {server_id}: {item}")]
    NotFound { server_id: ServerId, item: String },

    /// A live request made on behalf of the caller failed
    #[error("Price service failure: {0}")]
    ProviderFailure(String),
}

impl PriceError {
    /// Creates an UnknownServer error
    pub fn unknown_server(server: &str) -> Self {
        Self::UnknownServer {
            server: server.to_string(),
        }
    }

    /// Creates a NotFound error
    pub fn not_found(server_id: ServerId, item: &str) -> Self {
        Self::NotFound {
            server_id,
            item: item.to_string(),
        }
    }

    /// Creates a ProviderFailure error
    pub fn provider_failure(msg: impl Into<String>) -> Self {
        Self::ProviderFailure(msg.into())
    }
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config or catalog file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `RelayConfig`
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// Creates an Invalid error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors that prevent the relay from being built
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be constructed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The item catalog could not be loaded
    #[error("Failed to load item catalog: {0}")]
    Catalog(String),
}
