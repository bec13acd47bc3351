//! nwmarketprices.com data source implementation

use crate::{
    constants::{
        DEFAULT_API_BASE_URL, LATEST_PRICES_ENDPOINT, REQUEST_TIMEOUT_SECS,
        SERVERS_UPDATED_ENDPOINT, USER_AGENT,
    },
    error::ProviderError,
    provider::MarketDataSource,
    retry::{RetryPolicy, Sleeper, TokioSleeper},
    timestamp::parse_manifest_timestamp,
    types::{PriceHistory, PriceListing, ServerId, UpdateManifestEntry},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Manifest response: `{"server_last_updated": [[id, name, "...Z"], ...]}`
#[derive(Debug, Deserialize)]
struct ServersUpdatedResponse {
    server_last_updated: Vec<RawManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct RawManifestEntry(u32, String, String);

/// Parses the manifest document
pub fn parse_manifest(body: &str) -> Result<Vec<UpdateManifestEntry>, ProviderError> {
    let response: ServersUpdatedResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(format!("Failed to parse manifest: {}", e)))?;

    response
        .server_last_updated
        .into_iter()
        .map(|RawManifestEntry(id, name, updated)| {
            Ok(UpdateManifestEntry {
                server_id: ServerId::new(id),
                server_name: name,
                updated_at: parse_manifest_timestamp(&updated)?,
            })
        })
        .collect()
}

/// Parses a server's price listing (a JSON array of item records)
pub fn parse_listing(body: &str) -> Result<PriceListing, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(format!("Failed to parse price listing: {}", e)))
}

/// Parses an item's price history document
pub fn parse_price_history(body: &str) -> Result<PriceHistory, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(format!("Failed to parse price history: {}", e)))
}

/// Market data source backed by the nwmarketprices.com HTTP API
pub struct NwMarketPricesSource {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl NwMarketPricesSource {
    /// Creates a source against the public API with default timeout and retries
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_settings(
            DEFAULT_API_BASE_URL,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            RetryPolicy::default(),
        )
    }

    /// Creates a source with an explicit base URL, per-request timeout and
    /// listing retry policy
    pub fn with_settings(
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replaces the sleeper used between listing attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn manifest_url(&self) -> String {
        format!("{}{}", self.base_url, SERVERS_UPDATED_ENDPOINT)
    }

    fn listing_url(&self, server_id: ServerId) -> String {
        format!("{}{}{}", self.base_url, LATEST_PRICES_ENDPOINT, server_id)
    }

    fn history_url(&self, server_id: ServerId, item_id: &str) -> String {
        format!("{}/0/{}/?cn_id={}", self.base_url, server_id, item_id)
    }

    /// Issues one GET and returns the body of a successful response
    async fn get_text(&self, url: &str) -> Result<String, ProviderError> {
        tracing::debug!(url, "Requesting market data");

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MarketDataSource for NwMarketPricesSource {
    async fn fetch_update_manifest(&self) -> Result<Vec<UpdateManifestEntry>, ProviderError> {
        let body = self.get_text(&self.manifest_url()).await?;
        let entries = parse_manifest(&body)?;

        tracing::debug!(entries = entries.len(), "Fetched update manifest");
        Ok(entries)
    }

    async fn fetch_listing(&self, server_id: ServerId) -> Result<PriceListing, ProviderError> {
        let url = self.listing_url(server_id);
        let url = url.as_str();

        let listing = self
            .retry
            .run(self.sleeper.as_ref(), |_| async move {
                let body = self.get_text(url).await?;
                parse_listing(&body)
            })
            .await?;

        tracing::debug!(
            server_id = %server_id,
            items = listing.len(),
            "Fetched price listing"
        );
        Ok(listing)
    }

    async fn fetch_price_history(
        &self,
        server_id: ServerId,
        item_id: &str,
    ) -> Result<PriceHistory, ProviderError> {
        let body = self.get_text(&self.history_url(server_id, item_id)).await?;
        parse_price_history(&body)
    }

    fn source_name(&self) -> &'static str {
        "nwmarketprices"
    }
}
