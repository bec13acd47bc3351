//! Source abstraction for the remote market price service

use crate::{
    error::ProviderError,
    types::{PriceHistory, PriceListing, ServerId, UpdateManifestEntry},
};
use async_trait::async_trait;

/// Trait for market data sources
///
/// The refresh scheduler only talks to the service through this trait, so a
/// scripted source can stand in for the network in tests.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches the "which servers changed, and when" manifest
    ///
    /// One request, no retries. Fails with a transport-class error or
    /// `ProviderError::Parse`.
    async fn fetch_update_manifest(&self) -> Result<Vec<UpdateManifestEntry>, ProviderError>;

    /// Fetches the full price listing for a server
    ///
    /// Retries non-success responses according to the source's policy and
    /// fails with `ProviderError::FetchExhausted` once the budget is spent.
    /// An empty listing is a success.
    async fn fetch_listing(&self, server_id: ServerId) -> Result<PriceListing, ProviderError>;

    /// Fetches daily price history for one item, keyed by its external id
    async fn fetch_price_history(
        &self,
        server_id: ServerId,
        item_id: &str,
    ) -> Result<PriceHistory, ProviderError>;

    /// Returns the name of this source
    fn source_name(&self) -> &'static str;
}
