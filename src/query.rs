//! Read-only price lookups for presentation code
//!
//! Lookups read whatever is cached at the moment of the call. They never
//! wait for an in-flight refresh.
//!
//! ```no_run
//! use game_market_relay::{MarketRelay, PriceError, RelayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let relay = MarketRelay::new(RelayConfig::default())?;
//! relay.start();
//!
//! match relay.query().get_price_by_name("Delos", "Iron Ore").await {
//!     Ok(record) => println!("{}: {}", record.item_name, record.price),
//!     Err(PriceError::UnknownServer { server }) => println!("Invalid server name: {}", server),
//!     Err(PriceError::NotAvailable { .. }) => println!("No data for this server yet."),
//!     Err(PriceError::NotFound { .. }) => println!("Item not found."),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

use crate::{
    catalog::ItemCatalog,
    error::PriceError,
    provider::MarketDataSource,
    servers::ServerDirectory,
    store::MarketStore,
    types::{ItemPriceRecord, PriceHistory, PriceListing, ServerId, Timestamp},
};
use std::sync::Arc;

/// Cheap, cloneable handle for price lookups
#[derive(Clone)]
pub struct PriceQuery {
    store: Arc<MarketStore>,
    servers: Arc<ServerDirectory>,
    catalog: Arc<ItemCatalog>,
    source: Arc<dyn MarketDataSource>,
}

impl PriceQuery {
    pub fn new(
        store: Arc<MarketStore>,
        servers: Arc<ServerDirectory>,
        catalog: Arc<ItemCatalog>,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        Self {
            store,
            servers,
            catalog,
            source,
        }
    }

    /// Resolves a server display name, ignoring case
    pub fn resolve_server(&self, server_name: &str) -> Result<ServerId, PriceError> {
        self.servers
            .resolve(server_name)
            .ok_or_else(|| PriceError::unknown_server(server_name))
    }

    /// Gets an item's current price on a server
    ///
    /// `item_name` must already be the canonical name (any fuzzy matching
    /// happens before this call); it is compared ignoring case.
    pub async fn get_price(
        &self,
        server_id: ServerId,
        item_name: &str,
    ) -> Result<ItemPriceRecord, PriceError> {
        if !self.servers.contains(server_id) {
            return Err(PriceError::unknown_server(&server_id.to_string()));
        }

        let listing = self
            .store
            .listing(server_id)
            .await
            .ok_or(PriceError::NotAvailable { server_id })?;

        listing
            .find(item_name)
            .cloned()
            .ok_or_else(|| PriceError::not_found(server_id, item_name))
    }

    /// Same as `get_price`, taking the server's display name
    pub async fn get_price_by_name(
        &self,
        server_name: &str,
        item_name: &str,
    ) -> Result<ItemPriceRecord, PriceError> {
        let server_id = self.resolve_server(server_name)?;
        self.get_price(server_id, item_name).await
    }

    /// Gets a server's whole current listing
    pub async fn listing(&self, server_name: &str) -> Result<Arc<PriceListing>, PriceError> {
        let server_id = self.resolve_server(server_name)?;
        self.store
            .listing(server_id)
            .await
            .ok_or(PriceError::NotAvailable { server_id })
    }

    /// Manifest timestamp of a server's current listing
    pub async fn last_updated(&self, server_name: &str) -> Result<Timestamp, PriceError> {
        let server_id = self.resolve_server(server_name)?;
        self.store
            .last_updated(server_id)
            .await
            .ok_or(PriceError::NotAvailable { server_id })
    }

    /// Fetches an item's daily price history from the service
    ///
    /// Not cached. The item is resolved through the catalog.
    pub async fn price_history(
        &self,
        server_name: &str,
        item_name: &str,
    ) -> Result<PriceHistory, PriceError> {
        let server_id = self.resolve_server(server_name)?;
        let item = self
            .catalog
            .lookup(item_name)
            .ok_or_else(|| PriceError::not_found(server_id, item_name))?;

        self.source
            .fetch_price_history(server_id, &item.item_id)
            .await
            .map_err(|e| {
                tracing::warn!(
                    server_id = %server_id,
                    item = %item.name,
                    error = %e,
                    "Failed to fetch price history"
                );
                PriceError::provider_failure(e.to_string())
            })
    }
}
