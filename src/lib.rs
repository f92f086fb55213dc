// src/lib.rs
// Public library surface for the relay binary and integration tests.

pub mod broker;
pub mod config;
pub mod dispatch;
pub mod feed;
pub mod registry;
pub mod telemetry;
pub mod transform;

// ---- Re-exports for stable public API ----
pub use crate::broker::{
    AmqpConnector, ConnectionManager, ConnectionState, OutboundMessage, ResilientPublisher,
};
pub use crate::config::RelayConfig;
pub use crate::dispatch::{DispatchSettings, Dispatcher, DispatcherHandle, TickReport};
pub use crate::feed::{FeedFetcher, LdbSoapClient, RawFeedResult};
pub use crate::registry::{FeedSource, FeedSourceRegistry};
pub use crate::transform::{normalize, NormalizedRecord};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
