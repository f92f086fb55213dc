//! SLDB relay binary entrypoint.
//! Loads configuration, then polls every configured TIPLOC on a fixed
//! interval and relays the normalized boards to the broker until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use sldb_relay::{
    telemetry, AmqpConnector, ConnectionManager, DispatchSettings, Dispatcher, FeedSourceRegistry,
    LdbSoapClient, RelayConfig, ResilientPublisher, VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = RelayConfig::from_env().context("loading relay configuration")?;
    let registry =
        FeedSourceRegistry::from_sources(cfg.sources.clone()).context("registering feed sources")?;

    info!(
        version = VERSION,
        sources = registry.len(),
        interval_secs = cfg.poll_interval.as_secs(),
        exchange = %cfg.broker.exchange,
        "sldb relay starting"
    );

    let fetcher = LdbSoapClient::new(&cfg.feed).context("building LDB client")?;
    let manager = ConnectionManager::new(Box::new(AmqpConnector::new(&cfg.broker)));
    let publisher = ResilientPublisher::new(manager)
        .with_max_retry(cfg.max_retry)
        .with_backoff(cfg.retry_backoff)
        .with_publish_timeout(cfg.broker.publish_timeout());

    let handle = Dispatcher::new(
        registry,
        Arc::new(fetcher),
        publisher,
        DispatchSettings::from(&cfg),
    )
    .spawn();

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
    }
    info!("shutdown requested");
    handle.stop().await;
    info!("sldb relay finished");
    Ok(())
}
