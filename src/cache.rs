//! Per-server cache of the latest price listing

use crate::types::{ItemPriceRecord, PriceListing, ServerId};
use std::collections::HashMap;
use std::sync::Arc;

/// Latest fetched listing per server
///
/// A missing key or a `None` value both mean "never successfully fetched".
/// Listings are shared behind `Arc` and replaced wholesale, never merged.
#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    listings: HashMap<ServerId, Option<Arc<PriceListing>>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored value for a server
    pub fn put(&mut self, server_id: ServerId, listing: Option<Arc<PriceListing>>) {
        self.listings.insert(server_id, listing);
    }

    /// Returns the current listing, if one has been stored
    pub fn get(&self, server_id: ServerId) -> Option<Arc<PriceListing>> {
        self.listings.get(&server_id).cloned().flatten()
    }

    /// Looks up an item in the server's current listing, ignoring case
    ///
    /// The query must already be a canonical item name; no fuzzy matching
    /// happens here.
    pub fn find_item(&self, server_id: ServerId, item_name: &str) -> Option<ItemPriceRecord> {
        self.listings
            .get(&server_id)?
            .as_ref()?
            .find(item_name)
            .cloned()
    }

    pub fn server_ids(&self) -> impl Iterator<Item = ServerId> + '_ {
        self.listings.keys().copied()
    }

    /// Number of servers holding a listing
    pub fn available(&self) -> usize {
        self.listings.values().filter(|l| l.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn listing(names: &[&str]) -> PriceListing {
        PriceListing::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| ItemPriceRecord {
                    item_name: name.to_string(),
                    item_id: i.to_string(),
                    price: 1.0 + i as f64,
                    availability: 10,
                    highest_buy_order: 0.5,
                    quantity: 1,
                    last_updated: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_get_unset_is_unavailable() {
        let mut cache = PriceCache::new();
        assert!(cache.get(ServerId::new(9)).is_none());

        cache.put(ServerId::new(9), None);
        assert!(cache.get(ServerId::new(9)).is_none());
        assert_eq!(cache.available(), 0);
    }

    #[test]
    fn test_put_is_idempotent() {
        let server = ServerId::new(9);
        let shared = Arc::new(listing(&["Iron Ore"]));
        let mut cache = PriceCache::new();

        cache.put(server, Some(shared.clone()));
        let once = cache.get(server);
        cache.put(server, Some(shared));
        let twice = cache.get(server);

        assert_eq!(once, twice);
        assert_eq!(cache.available(), 1);
    }

    #[test]
    fn test_put_replaces_wholesale() {
        let server = ServerId::new(9);
        let mut cache = PriceCache::new();

        cache.put(server, Some(Arc::new(listing(&["Iron Ore", "Silver Ore"]))));
        cache.put(server, Some(Arc::new(listing(&["Hide"]))));

        assert!(cache.find_item(server, "iron ore").is_none());
        assert!(cache.find_item(server, "HIDE").is_some());
        assert_eq!(cache.get(server).unwrap().len(), 1);
    }

    #[test]
    fn test_find_item_ignores_case() {
        let server = ServerId::new(9);
        let mut cache = PriceCache::new();
        cache.put(server, Some(Arc::new(listing(&["Iron Ore"]))));

        let record = cache.find_item(server, "iRoN oRe").unwrap();
        assert_eq!(record.item_name, "Iron Ore");
        assert!(cache.find_item(server, "Iron Ingot").is_none());
        assert!(cache.find_item(ServerId::new(60), "Iron Ore").is_none());
    }
}
