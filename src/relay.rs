//! Market relay service
//!
//! Wires the data source, store, scheduler and query façade together and
//! owns the background refresh task.

use crate::{
    catalog::ItemCatalog,
    config::RelayConfig,
    error::{ProviderError, RelayError},
    metrics::FetchMetrics,
    provider::MarketDataSource,
    providers::NwMarketPricesSource,
    query::PriceQuery,
    scheduler::{CycleReport, RefreshScheduler},
    servers::ServerDirectory,
    store::MarketStore,
    types::{ComponentHealth, HealthStatus, MarketEvent},
};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Market relay
///
/// Holds the process-lifetime market state and the task that keeps it
/// current. Presentation code gets a `PriceQuery` from `query()` and never
/// writes.
///
/// # Example
/// ```no_run
/// use game_market_relay::{MarketRelay, RelayConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let relay = MarketRelay::new(RelayConfig::load()?)?;
/// relay.start();
///
/// let price = relay.query().get_price_by_name("delos", "iron ore").await?;
/// println!("{}: {:.2}", price.item_name, price.price);
///
/// relay.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct MarketRelay {
    store: Arc<MarketStore>,
    servers: Arc<ServerDirectory>,
    catalog: Arc<ItemCatalog>,
    source: Arc<dyn MarketDataSource>,
    scheduler: Arc<RefreshScheduler>,
    task: Mutex<Option<RefreshTask>>,
}

/// A running refresh loop and the token that stops it
struct RefreshTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl MarketRelay {
    /// Creates a relay talking to the HTTP price service
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let source = NwMarketPricesSource::with_settings(
            &config.api_base_url,
            config.request_timeout(),
            config.listing_retry(),
        )?;

        Self::with_source(config, Arc::new(source))
    }

    /// Creates a relay with a custom data source
    ///
    /// This is primarily for testing with mock sources.
    pub fn with_source(
        config: RelayConfig,
        source: Arc<dyn MarketDataSource>,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        let servers = Arc::new(config.server_directory()?);

        let catalog = match &config.item_catalog_path {
            Some(path) => {
                ItemCatalog::from_file(path).map_err(|e| RelayError::Catalog(e.to_string()))?
            }
            None => ItemCatalog::default(),
        };

        let store = Arc::new(MarketStore::new());
        let scheduler = Arc::new(RefreshScheduler::new(
            source.clone(),
            store.clone(),
            servers.clone(),
            config.refresh_interval(),
        ));

        Ok(Self {
            store,
            servers,
            catalog: Arc::new(catalog),
            source,
            scheduler,
            task: Mutex::new(None),
        })
    }

    /// Starts the background refresh task
    ///
    /// The first cycle runs immediately. Calling this again while the task is
    /// running does nothing. A relay that was shut down can be started again;
    /// each start gets its own cancellation token.
    pub fn start(&self) {
        let mut task = match self.task.lock() {
            Ok(task) => task,
            Err(poisoned) => poisoned.into_inner(),
        };
        if task.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = self.scheduler.spawn(cancel.clone());
        *task = Some(RefreshTask { cancel, handle });
    }

    /// Stops the refresh task and waits for it to exit
    pub async fn shutdown(&self) {
        let running = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(RefreshTask { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Refresh task ended abnormally");
            }
        }
    }

    /// Runs one refresh cycle now, outside the regular schedule
    pub async fn refresh_now(&self) -> Result<CycleReport, ProviderError> {
        self.scheduler.run_cycle().await
    }

    /// Returns a read-only lookup handle
    pub fn query(&self) -> PriceQuery {
        PriceQuery::new(
            self.store.clone(),
            self.servers.clone(),
            self.catalog.clone(),
            self.source.clone(),
        )
    }

    /// Subscribes to refresh events
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.scheduler.subscribe()
    }

    /// Returns the name of the current data source
    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    /// Gets listing fetch metrics including latency percentiles and success rates
    pub async fn get_fetch_metrics(&self) -> FetchMetrics {
        self.scheduler.metrics().get_metrics().await
    }

    /// Perform a health check on the relay
    ///
    /// Healthy when every known server has a listing, degraded when some do,
    /// unhealthy when none do.
    pub async fn health_check(&self) -> ComponentHealth {
        let mut details = std::collections::HashMap::new();

        let mut missing = Vec::new();
        for server_id in self.servers.ids() {
            if self.store.listing(server_id).await.is_none() {
                missing.push(self.servers.name_of(server_id).unwrap_or_default().to_string());
            }
        }
        let available = self.servers.len() - missing.len();

        details.insert("available_servers".to_string(), serde_json::json!(available));
        details.insert("missing_servers".to_string(), serde_json::json!(missing));
        details.insert("source_name".to_string(), serde_json::json!(self.source_name()));

        let metrics = self.get_fetch_metrics().await;
        details.insert(
            "fetch_success_rate".to_string(),
            serde_json::json!(metrics.success_rate),
        );
        details.insert(
            "skipped_cycles".to_string(),
            serde_json::json!(metrics.skipped_cycles),
        );

        let status = if available == 0 {
            HealthStatus::Unhealthy
        } else if !missing.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Market relay has listings for every server".to_string(),
            HealthStatus::Degraded => format!(
                "Market relay is missing listings for {} servers",
                missing.len()
            ),
            HealthStatus::Unhealthy => "Market relay has no listings yet".to_string(),
        };

        ComponentHealth {
            name: "market_relay".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockSource;
    use crate::timestamp::parse_manifest_timestamp;
    use crate::types::{PriceListing, ServerId, UpdateManifestEntry};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn config() -> RelayConfig {
        RelayConfig {
            servers: BTreeMap::from([("delos".to_string(), 9), ("sutekh".to_string(), 60)]),
            ..RelayConfig::default()
        }
    }

    fn delos_manifest() -> Vec<UpdateManifestEntry> {
        vec![UpdateManifestEntry {
            server_id: ServerId::new(9),
            server_name: "Delos".to_string(),
            updated_at: parse_manifest_timestamp("2024-01-01T10:00:00Z").unwrap(),
        }]
    }

    fn iron_ore() -> PriceListing {
        serde_json::from_str(
            r#"[{
                "ItemName": "Iron Ore",
                "ItemId": 123,
                "Price": 5.0,
                "Availability": 100,
                "HighestBuyOrder": 4.5,
                "Qty": 50,
                "LastUpdated": "2024-01-01T09:59:00.123456"
            }]"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_then_query() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(delos_manifest());
        source.set_listing(ServerId::new(9), iron_ore());
        let relay = MarketRelay::with_source(config(), source.clone()).unwrap();

        let report = relay.refresh_now().await.unwrap();
        assert_eq!(report.refreshed, vec![ServerId::new(9)]);

        let record = relay
            .query()
            .get_price_by_name("delos", "iron ore")
            .await
            .unwrap();
        assert_eq!(record.item_name, "Iron Ore");
        assert_eq!(record.item_id, "123");
        assert_eq!(record.price, 5.0);
        assert_eq!(record.availability, 100);
        assert_eq!(record.highest_buy_order, 4.5);
        assert_eq!(record.quantity, 50);

        relay.refresh_now().await.unwrap();
        assert_eq!(source.listing_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_health_check_levels() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(delos_manifest());
        source.set_listing(ServerId::new(9), iron_ore());
        let relay = MarketRelay::with_source(config(), source.clone()).unwrap();

        assert_eq!(relay.health_check().await.status, HealthStatus::Unhealthy);

        relay.refresh_now().await.unwrap();
        let health = relay.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.details["available_servers"], serde_json::json!(1));
        assert_eq!(health.details["missing_servers"], serde_json::json!(["sutekh"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(delos_manifest());
        source.set_listing(ServerId::new(9), iron_ore());
        let relay = MarketRelay::with_source(config(), source.clone()).unwrap();
        let mut events = relay.subscribe();

        relay.start();
        relay.start();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(source.manifest_calls(), 1);
        assert!(matches!(
            events.recv().await,
            Ok(MarketEvent::ListingRefreshed { item_count: 1, .. })
        ));

        relay.shutdown().await;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(source.manifest_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_shutdown() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(delos_manifest());
        source.set_listing(ServerId::new(9), iron_ore());
        let relay = MarketRelay::with_source(config(), source.clone()).unwrap();

        relay.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        relay.shutdown().await;
        assert_eq!(source.manifest_calls(), 1);

        relay.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.manifest_calls(), 2);

        relay.shutdown().await;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(source.manifest_calls(), 2);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad = RelayConfig {
            listing_attempts: 0,
            ..RelayConfig::default()
        };
        let result = MarketRelay::with_source(bad, Arc::new(MockSource::new()));
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[test]
    fn test_missing_catalog_file() {
        let with_catalog = RelayConfig {
            item_catalog_path: Some("/nonexistent/item_list.json".into()),
            ..RelayConfig::default()
        };
        let result = MarketRelay::with_source(with_catalog, Arc::new(MockSource::new()));
        assert!(matches!(result, Err(RelayError::Catalog(_))));
    }
}
