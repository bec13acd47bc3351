use game_market_relay::{MarketEvent, MarketRelay, RelayConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // An explicit path argument wins over MARKET_RELAY_CONFIG
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let mut config = RelayConfig::from_file(&path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => RelayConfig::load()?,
    };

    tracing::info!(
        api = %config.api_base_url,
        servers = config.servers.len(),
        refresh_interval_secs = config.refresh_interval_secs,
        "Starting market relay"
    );

    let relay = MarketRelay::new(config)?;
    let mut events = relay.subscribe();
    relay.start();

    let log_events = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event @ MarketEvent::ListingRefreshed { .. }) => {
                    tracing::info!(event_id = %event.id(), "{}", event)
                }
                Ok(event) => tracing::warn!(event_id = %event.id(), "{}", event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event log fell behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    relay.shutdown().await;
    log_events.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
