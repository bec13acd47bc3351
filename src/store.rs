//! Shared in-memory market state

use crate::{
    cache::PriceCache,
    freshness::FreshnessTable,
    types::{ItemPriceRecord, PriceListing, ServerId, Timestamp},
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Freshness and cache tables, always mutated together
#[derive(Debug, Default)]
struct MarketTables {
    freshness: FreshnessTable,
    cache: PriceCache,
}

/// What a reader sees for one server at one instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerSnapshot {
    /// Manifest timestamp of the cached listing
    pub last_updated: Option<Timestamp>,
    /// The cached listing
    pub listing: Option<Arc<PriceListing>>,
}

/// In-memory store for per-server listings and their freshness
///
/// Both tables sit behind a single lock, so a reader always sees a listing
/// together with the timestamp it was ingested for. The refresh scheduler is
/// the only writer; everything else reads.
#[derive(Debug, Default)]
pub struct MarketStore {
    tables: RwLock<MarketTables>,
}

impl MarketStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a manifest timestamp is newer than what was last ingested
    pub async fn should_ingest(&self, server_id: ServerId, candidate: Timestamp) -> bool {
        self.tables
            .read()
            .await
            .freshness
            .should_ingest(server_id, candidate)
    }

    /// Stores a freshly fetched listing and its manifest timestamp
    ///
    /// The freshness check is repeated under the write guard, then the
    /// tracker and the cache are written back to back. Returns false, and
    /// leaves the store untouched, if a newer or equal update already landed.
    pub async fn ingest(
        &self,
        server_id: ServerId,
        updated_at: Timestamp,
        listing: PriceListing,
    ) -> bool {
        let listing = Arc::new(listing);
        let mut tables = self.tables.write().await;

        if !tables.freshness.should_ingest(server_id, updated_at) {
            return false;
        }
        tables.freshness.record(server_id, updated_at);
        tables.cache.put(server_id, Some(listing));
        true
    }

    /// Reads timestamp and listing for a server under one guard
    pub async fn snapshot(&self, server_id: ServerId) -> ServerSnapshot {
        let tables = self.tables.read().await;
        ServerSnapshot {
            last_updated: tables.freshness.get(server_id),
            listing: tables.cache.get(server_id),
        }
    }

    /// Gets the current listing for a server
    pub async fn listing(&self, server_id: ServerId) -> Option<Arc<PriceListing>> {
        self.tables.read().await.cache.get(server_id)
    }

    /// Gets the manifest timestamp of the current listing
    pub async fn last_updated(&self, server_id: ServerId) -> Option<Timestamp> {
        self.tables.read().await.freshness.get(server_id)
    }

    /// Looks up an item by canonical name, ignoring case
    pub async fn find_item(&self, server_id: ServerId, item_name: &str) -> Option<ItemPriceRecord> {
        self.tables.read().await.cache.find_item(server_id, item_name)
    }

    /// Servers with a cached listing, in ascending order
    pub async fn server_ids(&self) -> Vec<ServerId> {
        let tables = self.tables.read().await;
        let mut ids: Vec<_> = tables.cache.server_ids().collect();
        ids.sort();
        ids
    }

    /// Servers with a recorded freshness timestamp, in ascending order
    pub async fn tracked_server_ids(&self) -> Vec<ServerId> {
        let tables = self.tables.read().await;
        let mut ids: Vec<_> = tables.freshness.server_ids().collect();
        ids.sort();
        ids
    }

    /// Number of servers holding a listing
    pub async fn available_servers(&self) -> usize {
        self.tables.read().await.cache.available()
    }
}
