//! # Game Market Relay
//!
//! Keeps an in-memory copy of game-economy market prices, per game server,
//! fresh enough for a chat bot to answer price questions without calling the
//! remote price service on every request.
//!
//! ## Architecture
//!
//! ```text
//! RefreshScheduler (immediately, then every 15 min)
//!     ↓
//! MarketDataSource::fetch_update_manifest  ("which servers changed, and when")
//!     ↓  known servers with a strictly newer timestamp
//! MarketDataSource::fetch_listing          (retried, concurrent across servers)
//!     ↓
//! MarketStore::ingest                      (freshness + listing, one write)
//!     ↓
//! PriceQuery (get_price, get_price_by_name, price_history)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use game_market_relay::{MarketRelay, RelayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let relay = MarketRelay::new(RelayConfig::load()?)?;
//! relay.start();
//!
//! let query = relay.query();
//! let ore = query.get_price_by_name("Delos", "Iron Ore").await?;
//! println!("{} on Delos: {:.2} ({} available)", ore.item_name, ore.price, ore.availability);
//!
//! relay.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See [`RelayConfig`]. Defaults live in [`constants`]; a TOML file named by
//! `MARKET_RELAY_CONFIG` and a couple of environment variables override them.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod freshness;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod query;
pub mod relay;
pub mod retry;
pub mod scheduler;
pub mod servers;
pub mod store;
pub mod timestamp;
pub mod types;

// Re-export commonly used types
pub use config::RelayConfig;
pub use error::{ConfigError, PriceError, ProviderError, RelayError};
pub use metrics::FetchMetrics;
pub use provider::MarketDataSource;
pub use query::PriceQuery;
pub use relay::MarketRelay;
pub use scheduler::{CycleReport, RefreshScheduler};
pub use servers::ServerDirectory;
pub use store::MarketStore;
pub use types::{
    ComponentHealth, HealthStatus, ItemPriceRecord, MarketEvent, PriceHistory, PriceListing,
    ServerId, Timestamp, UpdateManifestEntry,
};
