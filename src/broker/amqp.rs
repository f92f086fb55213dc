// src/broker/amqp.rs
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::debug;

use super::connection::{BrokerConnector, BrokerLink};
use super::{ConnectError, HeaderValue, MessageHeaders, PublishError};
use crate::config::BrokerSettings;

const REPLY_SUCCESS: u16 = 200;

/// Opens AMQP 0-9-1 links and declares the durable fanout exchange.
pub struct AmqpConnector {
    uri: AMQPUri,
    addr: String,
    exchange: String,
}

impl AmqpConnector {
    pub fn new(settings: &BrokerSettings) -> Self {
        let uri = AMQPUri {
            scheme: AMQPScheme::AMQP,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: settings.username.clone(),
                    password: settings.password.clone(),
                },
                host: settings.host.clone(),
                port: settings.port,
            },
            vhost: settings.vhost.clone(),
            query: AMQPQueryString {
                heartbeat: Some(settings.heartbeat_secs),
                connection_timeout: Some(settings.connection_timeout_secs * 1_000),
                ..Default::default()
            },
        };
        Self {
            uri,
            addr: format!("{}:{}", settings.host, settings.port),
            exchange: settings.exchange.clone(),
        }
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn open(&self) -> Result<Box<dyn BrokerLink>, ConnectError> {
        let connection = Connection::connect_uri(self.uri.clone(), ConnectionProperties::default())
            .await
            .map_err(|e| ConnectError::Transport {
                addr: self.addr.clone(),
                source: e.into(),
            })?;

        let channel = match connection.create_channel().await {
            Ok(c) => c,
            Err(e) => {
                let _ = connection.close(REPLY_SUCCESS, "channel failed").await;
                return Err(ConnectError::Channel(e.into()));
            }
        };

        let declared = channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;
        let prepared = match declared {
            Ok(()) => channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(|e| ConnectError::Channel(e.into())),
            Err(e) => Err(ConnectError::Declare {
                exchange: self.exchange.clone(),
                source: e.into(),
            }),
        };
        if let Err(e) = prepared {
            let _ = connection.close(REPLY_SUCCESS, "setup failed").await;
            return Err(e);
        }

        debug!(addr = %self.addr, exchange = %self.exchange, "amqp channel ready");
        Ok(Box::new(AmqpLink {
            connection,
            channel,
            exchange: self.exchange.clone(),
        }))
    }

    fn exchange(&self) -> &str {
        &self.exchange
    }
}

pub struct AmqpLink {
    connection: Connection,
    channel: Channel,
    exchange: String,
}

#[async_trait]
impl BrokerLink for AmqpLink {
    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn publish(
        &mut self,
        body: &[u8],
        headers: &MessageHeaders,
        expiration_ms: u64,
    ) -> Result<(), PublishError> {
        let properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_expiration(ShortString::from(expiration_ms.to_string()))
            .with_headers(field_table(headers));

        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await
            .map_err(|e| PublishError::Transport(e.into()))?
            .await
            .map_err(|e| PublishError::Transport(e.into()))?;

        if confirm.is_nack() {
            return Err(PublishError::Nacked);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PublishError> {
        let channel = self.channel.close(REPLY_SUCCESS, "bye").await;
        let connection = self.connection.close(REPLY_SUCCESS, "bye").await;
        channel
            .and(connection)
            .map_err(|e| PublishError::Transport(e.into()))
    }
}

fn field_table(headers: &MessageHeaders) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in headers {
        let value = match value {
            HeaderValue::Str(s) => AMQPValue::LongString(LongString::from(s.clone())),
            HeaderValue::Int(i) => AMQPValue::LongLongInt(*i),
        };
        table.insert(ShortString::from(key.clone()), value);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_map_to_amqp_types() {
        let mut headers = MessageHeaders::new();
        headers.insert("tiploc".into(), HeaderValue::from("DRBY"));
        headers.insert("id".into(), HeaderValue::from(14u32));

        let table = field_table(&headers);
        let inner = table.inner();
        assert_eq!(
            inner.get(&ShortString::from("tiploc")),
            Some(&AMQPValue::LongString(LongString::from("DRBY".to_string())))
        );
        assert_eq!(
            inner.get(&ShortString::from("id")),
            Some(&AMQPValue::LongLongInt(14))
        );
    }
}
