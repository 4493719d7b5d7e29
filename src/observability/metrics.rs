//! Metrics collection and exposition.
//!
//! # Metrics
//! - `scan_requests_total` (counter): finished scans by `outcome`
//!   (`clean`, `infected`, or an error kind)
//! - `scan_duration_seconds` (histogram): admission to verdict, by `outcome`
//! - `scan_admission_wait_seconds` (histogram): time spent waiting for a slot
//! - `scans_in_flight` (gauge): scans currently holding a slot
//! - `buffer_pool_checkouts_total` (counter): pool checkouts by `pool` and
//!   whether an idle buffer was `reused`

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    ::metrics::describe_counter!("scan_requests_total", "Finished scans by outcome");
    ::metrics::describe_histogram!("scan_duration_seconds", "Scan duration from admission to verdict");
    ::metrics::describe_histogram!("scan_admission_wait_seconds", "Time spent waiting for a scan slot");
    ::metrics::describe_gauge!("scans_in_flight", "Scans currently holding a slot");
    ::metrics::describe_counter!("buffer_pool_checkouts_total", "Buffer pool checkouts");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_scan(outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("scan_requests_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("scan_duration_seconds", "outcome" => outcome).record(elapsed.as_secs_f64());
}

pub fn record_admission(wait: Duration, in_flight: usize) {
    ::metrics::histogram!("scan_admission_wait_seconds").record(wait.as_secs_f64());
    record_in_flight(in_flight);
}

pub fn record_in_flight(in_flight: usize) {
    ::metrics::gauge!("scans_in_flight").set(in_flight as f64);
}

pub fn record_buffer_checkout(pool: &'static str, reused: bool) {
    let reused = if reused { "true" } else { "false" };
    ::metrics::counter!("buffer_pool_checkouts_total", "pool" => pool, "reused" => reused).increment(1);
}
