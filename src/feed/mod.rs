// src/feed/mod.rs
pub mod soap;
pub mod types;

pub use soap::LdbSoapClient;
pub use types::{FeedFetcher, FetchError, RawFeedResult, RawLocation, RawService};
