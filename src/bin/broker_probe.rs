//! Sends a few test messages through the resilient publisher to check broker
//! credentials and exchange wiring. Usage: `broker_probe [count]`.

use anyhow::{Context, Result};
use std::time::Duration;

use sldb_relay::broker::{AmqpConnector, ConnectionManager, OutboundMessage, ResilientPublisher};
use sldb_relay::config::BrokerSettings;

const PROBE_BODY: &[u8] = br#"{"test":"test1"}"#;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let count: u32 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("count must be a positive integer")?,
        None => 5,
    };

    let settings = BrokerSettings::from_env().context("loading broker settings")?;
    let manager = ConnectionManager::new(Box::new(AmqpConnector::new(&settings)));
    let mut publisher =
        ResilientPublisher::new(manager).with_publish_timeout(settings.publish_timeout());

    for n in 1..=count {
        let msg = OutboundMessage::serialized(PROBE_BODY).with_header("probe", n);
        let ok = publisher.send(msg).await;
        println!("probe {n}/{count}: {}", if ok { "sent" } else { "dropped" });
        if n < count {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    publisher.close().await;
    println!("broker-probe done");
    Ok(())
}
