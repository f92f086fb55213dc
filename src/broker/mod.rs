// src/broker/mod.rs
pub mod amqp;
pub mod connection;
pub mod publisher;

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::transform::NormalizedRecord;

pub use amqp::AmqpConnector;
pub use connection::{BrokerConnector, BrokerLink, ConnectionManager, ConnectionState};
pub use publisher::ResilientPublisher;

/// Boxed transport error, so retry logic does not depend on the AMQP client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Message TTL; stale undelivered boards expire instead of piling up.
pub const MESSAGE_TTL_MS: u64 = 100_000;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("could not connect to broker at {addr}: {source}")]
    Transport {
        addr: String,
        #[source]
        source: BoxError,
    },
    #[error("could not open channel: {0}")]
    Channel(#[source] BoxError),
    #[error("could not declare exchange `{exchange}`: {source}")]
    Declare {
        exchange: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no open broker channel")]
    NotConnected,
    #[error("publish failed: {0}")]
    Transport(#[source] BoxError),
    #[error("broker negatively acknowledged the message")]
    Nacked,
    #[error("publish not confirmed within {0:?}")]
    Timeout(Duration),
}

/// Failure of a single send attempt.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Str(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        HeaderValue::Str(v)
    }
}

impl From<u32> for HeaderValue {
    fn from(v: u32) -> Self {
        HeaderValue::Int(i64::from(v))
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Int(v)
    }
}

pub type MessageHeaders = BTreeMap<String, HeaderValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Encoded as `{"results": [...]}`.
    Results(Vec<NormalizedRecord>),
    /// Already-encoded body, sent verbatim.
    Serialized(Vec<u8>),
}

#[derive(Serialize)]
struct ResultsDocument<'a> {
    results: &'a [NormalizedRecord],
}

impl Payload {
    pub fn into_body(self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Payload::Results(records) => serde_json::to_vec(&ResultsDocument {
                results: &records,
            }),
            Payload::Serialized(body) => Ok(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub payload: Payload,
    pub headers: MessageHeaders,
}

impl OutboundMessage {
    pub fn results(records: Vec<NormalizedRecord>) -> Self {
        Self {
            payload: Payload::Results(records),
            headers: MessageHeaders::new(),
        }
    }

    pub fn serialized(body: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Payload::Serialized(body.into()),
            headers: MessageHeaders::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}
