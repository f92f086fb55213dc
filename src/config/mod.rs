// src/config/mod.rs
//! Process configuration, read once at startup.
//! Missing required settings are fatal; nothing re-reads the environment later.

pub mod sources;

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::registry::FeedSource;

pub const DEFAULT_BROKER_PORT: u16 = 5672;
pub const DEFAULT_VHOST: &str = "/";
pub const DEFAULT_TIME_WINDOW: u32 = 120;
pub const DEFAULT_NUM_ROWS: u32 = 100;
pub const DEFAULT_MAX_RETRY: u32 = 5;
pub const HEARTBEAT_SECS: u16 = 30;
pub const CONNECTION_TIMEOUT_SECS: u64 = 300;
/// Longest a single publish may wait on the broker, e.g. while it holds the
/// connection blocked on a resource alarm.
pub const BLOCKED_CONNECTION_TIMEOUT_SECS: u64 = 300;
/// Upper bound for the linear retry step.
pub const MAX_RETRY_BACKOFF_MS: u64 = 60_000;
const FEED_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("reading sources from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing sources from {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("no feed sources configured")]
    NoSources,
}

/// Broker address and credentials, handed to the connector once.
#[derive(Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub exchange: String,
    pub heartbeat_secs: u16,
    pub connection_timeout_secs: u64,
    pub blocked_timeout_secs: u64,
}

impl fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("vhost", &self.vhost)
            .field("exchange", &self.exchange)
            .field("blocked_timeout_secs", &self.blocked_timeout_secs)
            .finish()
    }
}

impl BrokerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let blocked_timeout_secs = parsed_or(
            lookup,
            "RMQ_BLOCKED_TIMEOUT_SECS",
            BLOCKED_CONNECTION_TIMEOUT_SECS,
        )?;
        if blocked_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "RMQ_BLOCKED_TIMEOUT_SECS",
                value: "0".into(),
                reason: "publish timeout must be at least one second".into(),
            });
        }

        Ok(Self {
            host: required(lookup, "BROKER_HOST")?,
            port: parsed_or(lookup, "BROKER_PORT", DEFAULT_BROKER_PORT)?,
            username: required(lookup, "RMQ_USER")?,
            password: required(lookup, "RMQ_PASS")?,
            vhost: optional(lookup, "RMQ_VHOST").unwrap_or_else(|| DEFAULT_VHOST.to_string()),
            exchange: required(lookup, "SLDB_RMQ_EXCHANGE")?,
            heartbeat_secs: HEARTBEAT_SECS,
            connection_timeout_secs: CONNECTION_TIMEOUT_SECS,
            blocked_timeout_secs,
        })
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.blocked_timeout_secs)
    }
}

/// LDB endpoint and access token.
#[derive(Clone)]
pub struct FeedSettings {
    pub endpoint: String,
    pub token: String,
    pub time_window_minutes: u32,
    pub max_rows: u32,
    pub request_timeout: Duration,
}

impl fmt::Debug for FeedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSettings")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("time_window_minutes", &self.time_window_minutes)
            .field("max_rows", &self.max_rows)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub broker: BrokerSettings,
    pub feed: FeedSettings,
    pub poll_interval: Duration,
    pub max_retry: u32,
    pub retry_backoff: Duration,
    pub sources: Vec<FeedSource>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|k| std::env::var(k).ok())
    }

    /// Same as [`RelayConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = required(lookup, "SLDB_TOKEN")?;
        let endpoint = match optional(lookup, "SLDB_ENDPOINT") {
            Some(e) => e,
            None => {
                let wsdl = required(lookup, "SLDB_WSDL")
                    .map_err(|_| ConfigError::Missing("SLDB_ENDPOINT"))?;
                strip_wsdl_suffix(&wsdl)
            }
        };

        let freq: u64 = parsed(lookup, "SLDB_FREQ")?;
        if freq == 0 {
            return Err(ConfigError::Invalid {
                var: "SLDB_FREQ",
                value: "0".into(),
                reason: "poll interval must be at least one second".into(),
            });
        }

        let backoff_ms: u64 = parsed_or(lookup, "SLDB_RETRY_BACKOFF_MS", 0)?;
        if backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(ConfigError::Invalid {
                var: "SLDB_RETRY_BACKOFF_MS",
                value: backoff_ms.to_string(),
                reason: format!("retry step is capped at {MAX_RETRY_BACKOFF_MS} ms"),
            });
        }

        let broker = BrokerSettings::from_lookup(lookup)?;
        let feed = FeedSettings {
            endpoint,
            token,
            time_window_minutes: parsed_or(lookup, "SLDB_TIME_WINDOW", DEFAULT_TIME_WINDOW)?,
            max_rows: parsed_or(lookup, "SLDB_NUM_ROWS", DEFAULT_NUM_ROWS)?,
            request_timeout: FEED_REQUEST_TIMEOUT,
        };

        let sources = sources::load_sources_default(lookup)?;
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        Ok(Self {
            broker,
            feed,
            poll_interval: Duration::from_secs(freq),
            max_retry: parsed_or(lookup, "SLDB_MAX_RETRY", DEFAULT_MAX_RETRY)?,
            retry_backoff: Duration::from_millis(backoff_ms),
            sources,
        })
    }
}

fn strip_wsdl_suffix(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.rsplit_once('?') {
        Some((base, query)) if query.eq_ignore_ascii_case("wsdl") => base.to_string(),
        _ => trimmed.to_string(),
    }
}

fn optional(lookup: &dyn Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(
    lookup: &dyn Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, var).ok_or(ConfigError::Missing(var))
}

fn parsed<T>(lookup: &dyn Fn(&str) -> Option<String>, var: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let raw = required(lookup, var)?;
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn parsed_or<T>(
    lookup: &dyn Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match optional(lookup, var) {
        None => Ok(default),
        Some(_) => parsed(lookup, var),
    }
}
