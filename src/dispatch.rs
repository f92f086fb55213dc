// src/dispatch.rs
//! # Scheduler / Dispatcher
//! One tokio task, one timer. Each tick walks the registry in order and runs
//! fetch → normalize → publish per source. A failing source is logged and
//! skipped; it never aborts the rest of the tick.

use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::broker::{OutboundMessage, ResilientPublisher};
use crate::config::{RelayConfig, DEFAULT_NUM_ROWS, DEFAULT_TIME_WINDOW};
use crate::feed::FeedFetcher;
use crate::registry::{FeedSource, FeedSourceRegistry};
use crate::telemetry;
use crate::transform::{normalize, NormalizedRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchSettings {
    pub interval: Duration,
    pub time_window_minutes: u32,
    pub max_rows: u32,
}

impl DispatchSettings {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            time_window_minutes: DEFAULT_TIME_WINDOW,
            max_rows: DEFAULT_NUM_ROWS,
        }
    }
}

impl From<&RelayConfig> for DispatchSettings {
    fn from(cfg: &RelayConfig) -> Self {
        Self {
            interval: cfg.poll_interval,
            time_window_minutes: cfg.feed.time_window_minutes,
            max_rows: cfg.feed.max_rows,
        }
    }
}

/// Outcome counts for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sources: usize,
    pub published: usize,
    pub fetch_failed: usize,
    pub publish_failed: usize,
}

pub struct Dispatcher {
    registry: FeedSourceRegistry,
    fetcher: Arc<dyn FeedFetcher>,
    publisher: ResilientPublisher,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        registry: FeedSourceRegistry,
        fetcher: Arc<dyn FeedFetcher>,
        publisher: ResilientPublisher,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            fetcher,
            publisher,
            settings,
        }
    }

    pub fn registry(&self) -> &FeedSourceRegistry {
        &self.registry
    }

    pub fn publisher(&self) -> &ResilientPublisher {
        &self.publisher
    }

    /// Run every registered source once, in registration order.
    pub async fn tick(&mut self) -> TickReport {
        telemetry::describe_metrics();

        let Self {
            registry,
            fetcher,
            publisher,
            settings,
        } = self;

        let mut report = TickReport {
            sources: registry.len(),
            ..Default::default()
        };

        for source in registry.iter() {
            let board = match fetcher
                .fetch(source.tiploc(), settings.time_window_minutes, settings.max_rows)
                .await
            {
                Ok(b) => b,
                Err(e) => {
                    warn!(
                        error = %e,
                        tiploc = source.tiploc(),
                        fetcher = fetcher.name(),
                        "feed fetch failed, skipping source this tick"
                    );
                    counter!("relay_fetch_errors_total", "tiploc" => source.tiploc().to_string())
                        .increment(1);
                    report.fetch_failed += 1;
                    continue;
                }
            };

            let records = normalize(&board);
            counter!("relay_services_total").increment(records.len() as u64);

            if publisher.send(message_for(source, records)).await {
                report.published += 1;
            } else {
                report.publish_failed += 1;
            }
        }

        let now = chrono::Utc::now().timestamp().max(0) as f64;
        counter!("relay_ticks_total").increment(1);
        gauge!("relay_last_tick_ts").set(now);

        info!(
            target: "dispatch",
            sources = report.sources,
            published = report.published,
            fetch_failed = report.fetch_failed,
            publish_failed = report.publish_failed,
            "tick complete"
        );
        report
    }

    /// Tick on the configured interval until `stop` flips to `true`.
    /// The first tick fires immediately; a slow tick delays the next one.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Self {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = stop.changed() => {
                    // Sender dropped counts as a stop request too.
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        self.publisher.close().await;
        info!(target: "dispatch", "dispatcher stopped");
        self
    }

    pub fn spawn(self) -> DispatcherHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(stop_rx));
        DispatcherHandle { stop_tx, join }
    }
}

/// Headers: `tiploc` always, `id` when the source has a display id.
pub fn message_for(source: &FeedSource, records: Vec<NormalizedRecord>) -> OutboundMessage {
    let msg = OutboundMessage::results(records).with_header("tiploc", source.tiploc());
    match source.id() {
        Some(id) => msg.with_header("id", id),
        None => msg,
    }
}

pub struct DispatcherHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<Dispatcher>,
}

impl DispatcherHandle {
    /// Ask the loop to stop after the in-flight tick and wait for it.
    /// Returns the dispatcher, or `None` if its task panicked.
    pub async fn stop(self) -> Option<Dispatcher> {
        let _ = self.stop_tx.send(true);
        match self.join.await {
            Ok(d) => Some(d),
            Err(e) => {
                warn!(error = %e, "dispatcher task ended abnormally");
                None
            }
        }
    }
}
