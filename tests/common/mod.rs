// tests/common/mod.rs
// Shared mocks: a scripted feed and a recording broker.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use sldb_relay::broker::{
    BrokerConnector, BrokerLink, ConnectError, ConnectionManager, MessageHeaders, PublishError,
    ResilientPublisher,
};
use sldb_relay::feed::{FeedFetcher, FetchError, RawFeedResult, RawLocation, RawService};

// ---------------- feed ----------------

pub struct MockFetcher {
    boards: HashMap<String, Result<RawFeedResult, String>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            boards: HashMap::new(),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn with_board(mut self, tiploc: &str, board: RawFeedResult) -> Self {
        self.boards.insert(tiploc.to_string(), Ok(board));
        self
    }

    pub fn failing(mut self, tiploc: &str, message: &str) -> Self {
        self.boards
            .insert(tiploc.to_string(), Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for MockFetcher {
    async fn fetch(
        &self,
        tiploc: &str,
        _window_minutes: u32,
        _max_rows: u32,
    ) -> Result<RawFeedResult, FetchError> {
        self.calls.lock().unwrap().push(tiploc.to_string());
        match self.boards.get(tiploc) {
            Some(Ok(board)) => Ok(board.clone()),
            Some(Err(message)) => Err(FetchError::Fault {
                code: "soap:Server".into(),
                message: message.clone(),
            }),
            None => Err(FetchError::Status { status: 404 }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub fn service(headcode: &str) -> RawService {
    RawService {
        train_id: Some(headcode.to_string()),
        uid: Some(format!("U{headcode}")),
        operator: Some("Northern".into()),
        operator_code: Some("NT".into()),
        origin: Some(RawLocation {
            tiploc: Some("LEEDS".into()),
            location_name: Some("Leeds".into()),
        }),
        destination: Some(RawLocation {
            tiploc: Some("MNCRVIC".into()),
            location_name: Some("Manchester Victoria".into()),
        }),
        platform: Some("3".into()),
        platform_is_hidden: false,
        sta: Some("2024-05-01T10:15:00".into()),
        eta: Some("2024-05-01T10:17:30".into()),
        std: Some("2024-05-01T10:18:00".into()),
        etd: Some("2024-05-01T10:19:00".into()),
        length: Some("4".into()),
    }
}

pub fn board(headcodes: &[&str]) -> RawFeedResult {
    RawFeedResult {
        location_name: Some("Test".into()),
        generated_at: None,
        services: headcodes.iter().map(|h| service(h)).collect(),
    }
}

// ---------------- broker ----------------

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub body: Vec<u8>,
    pub headers: MessageHeaders,
    pub expiration_ms: u64,
}

impl Published {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Debug, Default)]
pub struct BrokerLog {
    pub connects: usize,
    pub publish_attempts: usize,
    pub closes: usize,
    pub live_links: usize,
    /// Live link count seen at the start of every connect.
    pub live_at_connect: Vec<usize>,
    pub published: Vec<Published>,
}

#[derive(Debug, Default)]
struct Script {
    fail_connects: usize,
    fail_publishes: usize,
    stall_publishes: usize,
}

#[derive(Clone, Default)]
pub struct MockBroker {
    log: Arc<Mutex<BrokerLog>>,
    script: Arc<Mutex<Script>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` publishes fail with a transport error.
    pub fn failing_publishes(self, n: usize) -> Self {
        self.script.lock().unwrap().fail_publishes = n;
        self
    }

    /// The next `n` publishes never complete, like a broker that holds the
    /// connection blocked while heartbeats keep it open.
    pub fn stalling_publishes(self, n: usize) -> Self {
        self.script.lock().unwrap().stall_publishes = n;
        self
    }

    /// The next `n` connects are refused.
    pub fn failing_connects(self, n: usize) -> Self {
        self.script.lock().unwrap().fail_connects = n;
        self
    }

    pub fn connector(&self) -> Box<dyn BrokerConnector> {
        Box::new(MockConnector {
            broker: self.clone(),
        })
    }

    pub fn publisher(&self, max_retry: u32) -> ResilientPublisher {
        ResilientPublisher::new(ConnectionManager::new(self.connector())).with_max_retry(max_retry)
    }

    pub fn log(&self) -> MutexGuard<'_, BrokerLog> {
        self.log.lock().unwrap()
    }
}

struct MockConnector {
    broker: MockBroker,
}

#[async_trait]
impl BrokerConnector for MockConnector {
    async fn open(&self) -> Result<Box<dyn BrokerLink>, ConnectError> {
        let mut log = self.broker.log.lock().unwrap();
        log.connects += 1;
        let live = log.live_links;
        log.live_at_connect.push(live);

        let mut script = self.broker.script.lock().unwrap();
        if script.fail_connects > 0 {
            script.fail_connects -= 1;
            return Err(ConnectError::Transport {
                addr: "mock:5672".into(),
                source: "connection refused".into(),
            });
        }
        log.live_links += 1;
        Ok(Box::new(MockLink {
            broker: self.broker.clone(),
            open: true,
        }))
    }

    fn exchange(&self) -> &str {
        "sldb-test"
    }
}

struct MockLink {
    broker: MockBroker,
    open: bool,
}

#[async_trait]
impl BrokerLink for MockLink {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn publish(
        &mut self,
        body: &[u8],
        headers: &MessageHeaders,
        expiration_ms: u64,
    ) -> Result<(), PublishError> {
        let stalled = {
            let mut log = self.broker.log.lock().unwrap();
            log.publish_attempts += 1;
            let mut script = self.broker.script.lock().unwrap();
            if script.stall_publishes > 0 {
                script.stall_publishes -= 1;
                true
            } else {
                false
            }
        };
        if stalled {
            return std::future::pending().await;
        }

        let mut log = self.broker.log.lock().unwrap();
        let mut script = self.broker.script.lock().unwrap();
        if script.fail_publishes > 0 {
            script.fail_publishes -= 1;
            self.open = false;
            return Err(PublishError::Transport("channel closed by broker".into()));
        }
        log.published.push(Published {
            body: body.to_vec(),
            headers: headers.clone(),
            expiration_ms,
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PublishError> {
        self.broker.log.lock().unwrap().closes += 1;
        if !self.open {
            return Err(PublishError::Transport("connection already closed".into()));
        }
        self.open = false;
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        if let Ok(mut log) = self.broker.log.lock() {
            log.live_links -= 1;
        }
    }
}
