//! Types for the market relay

use crate::timestamp::deserialize_listing_timestamp;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// UTC instant as reported by the price service
pub type Timestamp = DateTime<Utc>;

/// Stable identifier of a game server
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(u32);

impl ServerId {
    /// Wraps a raw server id
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id used in service URLs
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the "which servers changed, and when" manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateManifestEntry {
    /// Server id as reported by the service
    pub server_id: ServerId,
    /// Display name as reported by the service
    pub server_name: String,
    /// When the server's prices last changed
    pub updated_at: Timestamp,
}

/// Price information for one item on one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPriceRecord {
    #[serde(rename = "ItemName")]
    pub item_name: String,

    /// External item id, used for links and icons
    #[serde(rename = "ItemId", deserialize_with = "deserialize_item_id")]
    pub item_id: String,

    /// Lowest listed sell price
    #[serde(rename = "Price")]
    pub price: f64,

    /// Units available at the listed price
    #[serde(rename = "Availability")]
    pub availability: u64,

    #[serde(rename = "HighestBuyOrder")]
    pub highest_buy_order: f64,

    #[serde(rename = "Qty")]
    pub quantity: u64,

    /// When the service last saw this item (sub-second part dropped)
    #[serde(rename = "LastUpdated", deserialize_with = "deserialize_listing_timestamp")]
    pub last_updated: Timestamp,
}

impl ItemPriceRecord {
    /// Case-insensitive exact name comparison against an already lowercased query
    fn matches_lowercase(&self, query_lower: &str) -> bool {
        self.item_name.to_lowercase() == query_lower
    }
}

/// The full set of item prices for one server at one point in time
///
/// Immutable once fetched; a refresh replaces the whole listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceListing {
    records: Vec<ItemPriceRecord>,
}

impl PriceListing {
    /// Creates a listing from records in service order
    pub fn new(records: Vec<ItemPriceRecord>) -> Self {
        Self { records }
    }

    /// Finds an item by name, ignoring case
    pub fn find(&self, item_name: &str) -> Option<&ItemPriceRecord> {
        let query = item_name.to_lowercase();
        self.records.iter().find(|r| r.matches_lowercase(&query))
    }

    pub fn records(&self) -> &[ItemPriceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One day of an item's price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryPoint {
    #[serde(rename = "date_only")]
    pub date: NaiveDate,
    pub avg_price: f64,
    pub rolling_average: f64,
    pub lowest_price: f64,
    pub highest_buy_order: f64,
    #[serde(rename = "avail")]
    pub availability: u64,
}

/// Daily price history for one item on one server, as used for charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    #[serde(rename = "price_graph_data")]
    pub points: Vec<PriceHistoryPoint>,

    #[serde(deserialize_with = "deserialize_listing_timestamp")]
    pub last_checked: Timestamp,
}

/// Accepts the item id as either a JSON string or a JSON integer
fn deserialize_item_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Market events published by the refresh scheduler
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketEvent {
    /// A server's listing was replaced
    ListingRefreshed {
        id: Uuid,
        server_id: ServerId,
        server_name: String,
        item_count: usize,
        updated_at: Timestamp,
        timestamp: DateTime<Utc>,
    },

    /// A server's listing could not be fetched this cycle
    ListingFetchFailed {
        id: Uuid,
        server_id: ServerId,
        server_name: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The manifest could not be fetched, so the whole cycle was skipped
    CycleFailed {
        id: Uuid,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl MarketEvent {
    pub(crate) fn listing_refreshed(
        server_id: ServerId,
        server_name: &str,
        item_count: usize,
        updated_at: Timestamp,
    ) -> Self {
        Self::ListingRefreshed {
            id: Uuid::new_v4(),
            server_id,
            server_name: server_name.to_string(),
            item_count,
            updated_at,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn listing_fetch_failed(
        server_id: ServerId,
        server_name: &str,
        error_message: String,
    ) -> Self {
        Self::ListingFetchFailed {
            id: Uuid::new_v4(),
            server_id,
            server_name: server_name.to_string(),
            error_message,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn cycle_failed(error_message: String) -> Self {
        Self::CycleFailed {
            id: Uuid::new_v4(),
            error_message,
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            MarketEvent::ListingRefreshed { id, .. } => *id,
            MarketEvent::ListingFetchFailed { id, .. } => *id,
            MarketEvent::CycleFailed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            MarketEvent::ListingRefreshed { .. } => "LISTING_REFRESHED",
            MarketEvent::ListingFetchFailed { .. } => "LISTING_FETCH_FAILED",
            MarketEvent::CycleFailed { .. } => "CYCLE_FAILED",
        }
    }
}

impl fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketEvent::ListingRefreshed {
                server_name,
                item_count,
                ..
            } => write!(f, "Listing refreshed: {} ({} items)", server_name, item_count),
            MarketEvent::ListingFetchFailed {
                server_name,
                error_message,
                ..
            } => write!(f, "Listing fetch failed for {}: {}", server_name, error_message),
            MarketEvent::CycleFailed { error_message, .. } => {
                write!(f, "Refresh cycle skipped: {}", error_message)
            }
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Every known server has a listing
    Healthy,
    /// Some known servers have a listing
    Degraded,
    /// No listings are available
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
