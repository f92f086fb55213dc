// src/broker/connection.rs
//! # Connection Manager
//! Owns the single logical broker connection (transport + channel).
//! Nothing outside this module holds the link; `close` is the only place a
//! live link is given up.

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, error, info};

use super::{ConnectError, MessageHeaders, PublishError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// An open transport plus channel with the exchange already declared.
#[async_trait]
pub trait BrokerLink: Send + Sync {
    /// True only while both transport and channel are live.
    fn is_open(&self) -> bool;

    async fn publish(
        &mut self,
        body: &[u8],
        headers: &MessageHeaders,
        expiration_ms: u64,
    ) -> Result<(), PublishError>;

    /// Close channel, then transport. Reports the first failure.
    async fn close(&mut self) -> Result<(), PublishError>;
}

/// Opens links. Address and credentials are fixed at construction.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrokerLink>, ConnectError>;

    /// Exchange the links publish to, for logging.
    fn exchange(&self) -> &str;
}

pub struct ConnectionManager {
    connector: Box<dyn BrokerConnector>,
    link: Option<Box<dyn BrokerLink>>,
}

impl ConnectionManager {
    pub fn new(connector: Box<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            link: None,
        }
    }

    pub fn exchange(&self) -> &str {
        self.connector.exchange()
    }

    /// Open a fresh link. On failure the state is left `Disconnected`.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        // Never leak a half-dead link behind a new one.
        self.close().await;

        counter!("relay_broker_connects_total").increment(1);
        match self.connector.open().await {
            Ok(link) => {
                debug!(exchange = self.connector.exchange(), "broker link opened");
                self.link = Some(link);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "could not create a connection to the broker");
                Err(e)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_open())
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub async fn publish(
        &mut self,
        body: &[u8],
        headers: &MessageHeaders,
        expiration_ms: u64,
    ) -> Result<(), PublishError> {
        let link = self.link.as_mut().ok_or(PublishError::NotConnected)?;
        link.publish(body, headers, expiration_ms).await
    }

    /// Best-effort close. Errors from an already broken link are swallowed;
    /// the state is always `Disconnected` afterwards.
    pub async fn close(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        match link.close().await {
            Ok(()) => info!("channel and connection closed"),
            Err(e) => info!(error = %e, "cannot gracefully close the connection"),
        }
    }
}
