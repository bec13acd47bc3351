//! Default settings for the market relay
//!
//! Every value here is a default only. `RelayConfig` reads overrides from a
//! TOML file and the environment, so tests and deployments never need to
//! touch these.

/// Base URL of the remote market price service
pub const DEFAULT_API_BASE_URL: &str = "https://nwmarketprices.com";

/// Endpoint reporting when each server's prices last changed
pub const SERVERS_UPDATED_ENDPOINT: &str = "/api/servers_updated/";

/// Endpoint prefix for a server's full price listing (`{prefix}{server_id}`)
pub const LATEST_PRICES_ENDPOINT: &str = "/api/latest-prices/";

/// How often the refresh cycle runs (in seconds)
pub const REFRESH_INTERVAL_SECS: u64 = 15 * 60;

/// HTTP request timeout for every call to the price service (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Attempts made for a single listing fetch before giving up for the cycle
pub const LISTING_FETCH_ATTEMPTS: u32 = 3;

/// Fixed pause between listing fetch attempts (in seconds)
pub const LISTING_RETRY_BACKOFF_SECS: u64 = 10;

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Environment variable naming a TOML config file
pub const CONFIG_PATH_ENV: &str = "MARKET_RELAY_CONFIG";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "MARKET_RELAY_API_URL";

/// Environment variable overriding the refresh interval (in seconds)
pub const REFRESH_SECS_ENV: &str = "MARKET_RELAY_REFRESH_SECS";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "game-market-relay/0.1.0";

/// Servers tracked by default, keyed by lowercase display name
pub const DEFAULT_SERVERS: &[(&str, u32)] = &[
    ("sutekh", 60),
    ("delos", 9),
    ("el dorado", 2),
    ("isabella", 49),
    ("castle of steel", 11),
    ("valhalla", 15),
    ("maramma", 7),
    ("lilith", 51),
    ("devaloka", 16),
    ("artorius", 78),
    ("asgard", 35),
    ("aaru", 25),
    ("nyx", 58),
    ("nysa", 27),
    ("kronos", 48),
    ("barri", 3),
    ("abaton", 24),
];
