// src/broker/publisher.rs
use metrics::counter;
use std::time::Duration;
use tracing::{error, warn};

use super::connection::{ConnectionManager, ConnectionState};
use super::{MessageHeaders, OutboundMessage, PublishError, SendError, MESSAGE_TTL_MS};
use crate::config::{BLOCKED_CONNECTION_TIMEOUT_SECS, DEFAULT_MAX_RETRY};

/// Single `send` over the shared connection, with a bounded
/// retry-and-reconnect budget. Failures resolve to `false`, never to errors.
pub struct ResilientPublisher {
    manager: ConnectionManager,
    max_retry: u32,
    backoff: Duration,
    publish_timeout: Duration,
    ttl_ms: u64,
}

impl ResilientPublisher {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            max_retry: DEFAULT_MAX_RETRY,
            backoff: Duration::ZERO,
            publish_timeout: Duration::from_secs(BLOCKED_CONNECTION_TIMEOUT_SECS),
            ttl_ms: MESSAGE_TTL_MS,
        }
    }

    /// Additional attempts after the first one.
    pub fn with_max_retry(mut self, retries: u32) -> Self {
        self.max_retry = retries;
        self
    }

    /// Linear delay step between attempts (`attempt * step`). Zero retries
    /// immediately.
    pub fn with_backoff(mut self, step: Duration) -> Self {
        self.backoff = step;
        self
    }

    /// Longest one publish attempt may wait for its confirm. A broker that
    /// blocks the connection keeps heartbeats alive, so this is what frees
    /// the attempt.
    pub fn with_publish_timeout(mut self, limit: Duration) -> Self {
        self.publish_timeout = limit;
        self
    }

    pub fn with_message_ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Publish `message`, reconnecting between attempts. Returns `true` on the
    /// first successful publish, `false` once `max_retry + 1` attempts failed.
    pub async fn send(&mut self, message: OutboundMessage) -> bool {
        let OutboundMessage { payload, headers } = message;
        // Encode once; retries resend the same bytes.
        let body = match payload.into_body() {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "could not encode message, dropping it");
                counter!("relay_messages_dropped_total").increment(1);
                return false;
            }
        };

        let max_attempts = self.max_retry.saturating_add(1);
        for attempt in 1..=max_attempts {
            counter!("relay_publish_attempts_total").increment(1);
            match self.try_publish(&body, &headers).await {
                Ok(()) => return true,
                Err(e) => {
                    self.manager.close().await;
                    counter!("relay_publish_failures_total").increment(1);
                    warn!(
                        attempt,
                        max_attempts,
                        exchange = self.manager.exchange(),
                        error = %e,
                        "unable to publish message to broker"
                    );
                    if attempt < max_attempts && !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff.saturating_mul(attempt)).await;
                    }
                }
            }
        }

        error!(
            max_attempts,
            exchange = self.manager.exchange(),
            "maximum sending attempts breached, giving up"
        );
        counter!("relay_messages_dropped_total").increment(1);
        false
    }

    async fn try_publish(
        &mut self,
        body: &[u8],
        headers: &MessageHeaders,
    ) -> Result<(), SendError> {
        if !self.manager.is_connected() {
            self.manager.connect().await?;
        }
        let limit = self.publish_timeout;
        match tokio::time::timeout(limit, self.manager.publish(body, headers, self.ttl_ms)).await {
            Ok(published) => published?,
            Err(_) => return Err(PublishError::Timeout(limit).into()),
        }
        Ok(())
    }

    /// Best-effort shutdown of the underlying connection.
    pub async fn close(&mut self) {
        self.manager.close().await;
    }
}
