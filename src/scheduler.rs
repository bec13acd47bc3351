//! Periodic refresh of the market store
//!
//! One cycle fetches the update manifest, works out which known servers have
//! a newer timestamp than the one last ingested, fetches those listings
//! concurrently, and ingests each success. Failures never escape a cycle: a
//! bad manifest skips the cycle, a bad listing skips that server, and the
//! next tick tries again.

use crate::{
    constants::EVENT_CHANNEL_CAPACITY,
    error::ProviderError,
    metrics::MetricsCollector,
    provider::MarketDataSource,
    servers::ServerDirectory,
    store::MarketStore,
    types::{MarketEvent, ServerId, Timestamp},
};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Rows in the manifest, known or not
    pub manifest_entries: usize,
    /// Servers whose listing was replaced
    pub refreshed: Vec<ServerId>,
    /// Servers whose listing fetch failed; they stay eligible next cycle
    pub failed: Vec<ServerId>,
    /// Known servers with nothing newer to fetch
    pub unchanged: usize,
    /// Manifest rows naming servers outside the directory
    pub unknown: usize,
}

enum ServerOutcome {
    Refreshed(ServerId),
    Failed(ServerId),
    Superseded,
}

/// Drives the refresh cycle on a fixed interval
///
/// Owns the write side of the `MarketStore`; readers hold their own `Arc` to
/// the same store.
pub struct RefreshScheduler {
    source: Arc<dyn MarketDataSource>,
    store: Arc<MarketStore>,
    servers: Arc<ServerDirectory>,
    metrics: Arc<MetricsCollector>,
    events: broadcast::Sender<MarketEvent>,
    interval: Duration,
}

impl RefreshScheduler {
    /// Creates a scheduler; `interval` is clamped to at least one millisecond
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<MarketStore>,
        servers: Arc<ServerDirectory>,
        interval: Duration,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new(source.source_name()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            source,
            store,
            servers,
            metrics,
            events,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Subscribes to refresh events
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one refresh cycle
    ///
    /// Returns the manifest error if the cycle was skipped; per-server
    /// failures are reported in the `CycleReport` instead.
    pub async fn run_cycle(&self) -> Result<CycleReport, ProviderError> {
        tracing::info!("Grabbing latest server update times");

        let manifest = match self.source.fetch_update_manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                self.metrics.record_cycle(false).await;
                self.publish(MarketEvent::cycle_failed(e.to_string()));
                return Err(e);
            }
        };

        let mut report = CycleReport {
            manifest_entries: manifest.len(),
            ..Default::default()
        };

        // Newest reported timestamp per known server
        let mut reported: BTreeMap<ServerId, Timestamp> = BTreeMap::new();
        for entry in &manifest {
            let Some(server_id) = self.servers.resolve(&entry.server_name) else {
                report.unknown += 1;
                continue;
            };
            if server_id != entry.server_id {
                tracing::debug!(
                    server = %entry.server_name,
                    reported_id = %entry.server_id,
                    configured_id = %server_id,
                    "Manifest id differs from configured id, using configured id"
                );
            }
            reported
                .entry(server_id)
                .and_modify(|ts| *ts = (*ts).max(entry.updated_at))
                .or_insert(entry.updated_at);
        }

        let mut due = Vec::new();
        for (server_id, updated_at) in reported {
            if self.store.should_ingest(server_id, updated_at).await {
                due.push((server_id, updated_at));
            } else {
                tracing::debug!(server_id = %server_id, "Prices unchanged");
                report.unchanged += 1;
            }
        }

        let fetches = due
            .into_iter()
            .map(|(server_id, updated_at)| self.refresh_server(server_id, updated_at));
        for outcome in join_all(fetches).await {
            match outcome {
                ServerOutcome::Refreshed(id) => report.refreshed.push(id),
                ServerOutcome::Failed(id) => report.failed.push(id),
                ServerOutcome::Superseded => report.unchanged += 1,
            }
        }

        self.metrics.record_cycle(true).await;
        tracing::info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            unchanged = report.unchanged,
            unknown = report.unknown,
            "Refresh cycle finished"
        );
        Ok(report)
    }

    async fn refresh_server(&self, server_id: ServerId, updated_at: Timestamp) -> ServerOutcome {
        let server_name = self.servers.name_of(server_id).unwrap_or("unknown");
        tracing::info!(server = server_name, server_id = %server_id, "Grabbing the latest prices");

        let start = Instant::now();
        match self.source.fetch_listing(server_id).await {
            Ok(listing) => {
                self.metrics.record_fetch(start.elapsed(), true).await;
                let item_count = listing.len();

                if !self.store.ingest(server_id, updated_at, listing).await {
                    return ServerOutcome::Superseded;
                }

                tracing::info!(
                    server = server_name,
                    server_id = %server_id,
                    items = item_count,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Finished grabbing prices"
                );
                self.publish(MarketEvent::listing_refreshed(
                    server_id,
                    server_name,
                    item_count,
                    updated_at,
                ));
                ServerOutcome::Refreshed(server_id)
            }
            Err(e) => {
                self.metrics.record_fetch(start.elapsed(), false).await;
                tracing::warn!(
                    server = server_name,
                    server_id = %server_id,
                    error = %e,
                    "Failed to fetch prices, will retry next cycle"
                );
                self.publish(MarketEvent::listing_fetch_failed(
                    server_id,
                    server_name,
                    e.to_string(),
                ));
                ServerOutcome::Failed(server_id)
            }
        }
    }

    fn publish(&self, event: MarketEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Runs cycles until `cancel` fires: once immediately, then every interval
    ///
    /// Cancellation drops an in-flight cycle. Each server's ingest is a single
    /// write under the store lock, so nothing is left half-written.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            refresh_interval_secs = self.interval.as_secs(),
            servers = self.servers.len(),
            "Starting market refresh task"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Abandoning in-flight refresh cycle");
                    break;
                }
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Skipping refresh cycle");
                    }
                }
            }
        }

        tracing::info!("Market refresh task stopped");
    }

    /// Spawns `run` on the tokio runtime
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockFailure, MockSource};
    use crate::timestamp::parse_manifest_timestamp;
    use crate::store::ServerSnapshot;
    use crate::types::{PriceListing, UpdateManifestEntry};

    fn entry(id: u32, name: &str, updated: &str) -> UpdateManifestEntry {
        UpdateManifestEntry {
            server_id: ServerId::new(id),
            server_name: name.to_string(),
            updated_at: parse_manifest_timestamp(updated).unwrap(),
        }
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

    fn scheduler(source: Arc<MockSource>) -> (RefreshScheduler, Arc<MarketStore>) {
        let store = Arc::new(MarketStore::new());
        let scheduler = RefreshScheduler::new(
            source,
            store.clone(),
            Arc::new(ServerDirectory::default()),
            Duration::from_secs(15 * 60),
        );
        (scheduler, store)
    }

    const DELOS: ServerId = ServerId::new(9);

    #[tokio::test]
    async fn test_first_cycle_fills_store_and_second_is_quiet() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T10:00:00Z")]);
        source.set_listing(DELOS, iron_ore());
        let (scheduler, store) = scheduler(source.clone());

        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report.refreshed, vec![DELOS]);

        let record = store.find_item(DELOS, "iron ore").await.unwrap();
        assert_eq!(record.item_id, "123");
        assert_eq!(
            store.last_updated(DELOS).await,
            Some(parse_manifest_timestamp("2024-01-01T10:00:00Z").unwrap())
        );

        let report = scheduler.run_cycle().await.unwrap();
        assert!(report.refreshed.is_empty());
        assert_eq!(report.unchanged, 1);
        assert_eq!(source.listing_calls(), vec![DELOS]);
    }

    #[tokio::test]
    async fn test_older_manifest_does_not_refetch() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T10:00:00Z")]);
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T09:00:00Z")]);
        source.set_listing(DELOS, iron_ore());
        let (scheduler, _store) = scheduler(source.clone());

        scheduler.run_cycle().await.unwrap();
        scheduler.run_cycle().await.unwrap();

        assert_eq!(source.manifest_calls(), 2);
        assert_eq!(source.listing_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_newer_manifest_refetches() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T10:00:00Z")]);
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T10:15:00Z")]);
        source.set_listing(DELOS, iron_ore());
        let (scheduler, store) = scheduler(source.clone());

        scheduler.run_cycle().await.unwrap();
        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.refreshed, vec![DELOS]);
        assert_eq!(source.listing_calls().len(), 2);
        assert_eq!(
            store.last_updated(DELOS).await,
            Some(parse_manifest_timestamp("2024-01-01T10:15:00Z").unwrap())
        );
    }

    #[tokio::test]
    async fn test_unknown_servers_never_stored() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![
            entry(9, "DELOS", "2024-01-01T10:00:00Z"),
            entry(99, "Nevermore", "2024-01-01T10:00:00Z"),
        ]);
        source.set_listing(DELOS, iron_ore());
        source.set_listing(ServerId::new(99), iron_ore());
        let (scheduler, store) = scheduler(source.clone());

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.unknown, 1);
        assert_eq!(source.listing_calls(), vec![DELOS]);
        assert_eq!(store.server_ids().await, vec![DELOS]);
        assert_eq!(store.tracked_server_ids().await, vec![DELOS]);
    }

    #[tokio::test]
    async fn test_manifest_failure_skips_cycle() {
        let source = Arc::new(MockSource::new());
        source.push_manifest_error(MockFailure::Status(502));
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T10:00:00Z")]);
        source.set_listing(DELOS, iron_ore());
        let (scheduler, store) = scheduler(source.clone());
        let mut events = scheduler.subscribe();

        let err = scheduler.run_cycle().await.unwrap_err();
        assert!(err.is_transport());
        assert!(source.listing_calls().is_empty());
        assert!(matches!(events.try_recv(), Ok(MarketEvent::CycleFailed { .. })));

        scheduler.run_cycle().await.unwrap();
        assert!(store.listing(DELOS).await.is_some());

        let metrics = scheduler.metrics().get_metrics().await;
        assert_eq!(metrics.skipped_cycles, 1);
        assert_eq!(metrics.completed_cycles, 1);
    }

    #[tokio::test]
    async fn test_malformed_manifest_skips_cycle() {
        let source = Arc::new(MockSource::new());
        source.push_manifest_error(MockFailure::Parse("missing server_last_updated".into()));
        let (scheduler, store) = scheduler(source.clone());

        let err = scheduler.run_cycle().await.unwrap_err();

        assert!(matches!(err, ProviderError::Parse(_)));
        assert_eq!(store.available_servers().await, 0);
    }

    #[tokio::test]
    async fn test_exhausted_fetch_leaves_server_eligible() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![
            entry(9, "Delos", "2024-01-01T10:00:00Z"),
            entry(60, "Sutekh", "2024-01-01T10:00:00Z"),
        ]);
        source.set_listing(DELOS, iron_ore());
        source.set_listing_error(ServerId::new(60), MockFailure::Exhausted);
        let (scheduler, store) = scheduler(source.clone());
        let mut events = scheduler.subscribe();

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.refreshed, vec![DELOS]);
        assert_eq!(report.failed, vec![ServerId::new(60)]);
        assert_eq!(store.snapshot(ServerId::new(60)).await, ServerSnapshot::default());

        let mut kinds = vec![
            events.try_recv().unwrap().event_type(),
            events.try_recv().unwrap().event_type(),
        ];
        kinds.sort();
        assert_eq!(kinds, vec!["LISTING_FETCH_FAILED", "LISTING_REFRESHED"]);

        source.set_listing(ServerId::new(60), iron_ore());
        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report.refreshed, vec![ServerId::new(60)]);
        assert!(store.find_item(ServerId::new(60), "Iron Ore").await.is_some());
    }

    #[tokio::test]
    async fn test_empty_listing_is_stored() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T10:00:00Z")]);
        source.set_listing(DELOS, PriceListing::default());
        let (scheduler, store) = scheduler(source);

        scheduler.run_cycle().await.unwrap();

        assert!(store.listing(DELOS).await.unwrap().is_empty());
        assert!(store.find_item(DELOS, "Iron Ore").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_manifest_rows_use_newest() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![
            entry(9, "Delos", "2024-01-01T10:00:00Z"),
            entry(9, "delos", "2024-01-01T11:00:00Z"),
        ]);
        source.set_listing(DELOS, iron_ore());
        let (scheduler, store) = scheduler(source.clone());

        scheduler.run_cycle().await.unwrap();

        assert_eq!(source.listing_calls().len(), 1);
        assert_eq!(
            store.last_updated(DELOS).await,
            Some(parse_manifest_timestamp("2024-01-01T11:00:00Z").unwrap())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_fetches_run_concurrently() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![
            entry(9, "Delos", "2024-01-01T10:00:00Z"),
            entry(60, "Sutekh", "2024-01-01T10:00:00Z"),
            entry(2, "El Dorado", "2024-01-01T10:00:00Z"),
        ]);
        for id in [9, 60, 2] {
            source.set_listing(ServerId::new(id), iron_ore());
        }
        source.set_listing_delay(Duration::from_secs(5));
        let (scheduler, _store) = scheduler(source);

        let start = tokio::time::Instant::now();
        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.refreshed.len(), 3);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_immediately_then_on_interval() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T10:00:00Z")]);
        source.set_listing(DELOS, iron_ore());
        let (scheduler, store) = scheduler(source.clone());
        let scheduler = Arc::new(scheduler);
        let cancel = CancellationToken::new();

        let handle = scheduler.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.manifest_calls(), 1);
        assert!(store.listing(DELOS).await.is_some());

        tokio::time::sleep(Duration::from_secs(15 * 60)).await;
        assert_eq!(source.manifest_calls(), 2);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(source.listing_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_in_flight_fetch() {
        let source = Arc::new(MockSource::new());
        source.push_manifest(vec![entry(9, "Delos", "2024-01-01T10:00:00Z")]);
        source.set_listing(DELOS, iron_ore());
        source.set_listing_delay(Duration::from_secs(3600));
        let (scheduler, store) = scheduler(source.clone());
        let scheduler = Arc::new(scheduler);
        let cancel = CancellationToken::new();

        let handle = scheduler.spawn(cancel.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.listing_calls(), vec![DELOS]);

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(store.snapshot(DELOS).await, ServerSnapshot::default());
    }
}
