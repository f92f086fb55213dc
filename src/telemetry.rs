// src/telemetry.rs
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "sldb_relay=info,dispatch=info,warn";

/// Install the global tracing subscriber.
/// `RUST_LOG` overrides the filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

/// One-time metrics registration (so series carry descriptions once an
/// exporter is installed).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_ticks_total", "Dispatcher ticks completed.");
        describe_counter!(
            "relay_fetch_errors_total",
            "Feed fetch failures, labelled by tiploc."
        );
        describe_counter!("relay_services_total", "Service records normalized.");
        describe_counter!(
            "relay_publish_attempts_total",
            "Broker publish attempts, retries included."
        );
        describe_counter!(
            "relay_publish_failures_total",
            "Broker publish attempts that failed."
        );
        describe_counter!(
            "relay_messages_dropped_total",
            "Messages dropped after the retry budget ran out."
        );
        describe_counter!(
            "relay_broker_connects_total",
            "Broker connection attempts."
        );
        describe_gauge!("relay_last_tick_ts", "Unix ts when the last tick finished.");
    });
}
