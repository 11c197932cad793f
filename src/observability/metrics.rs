//! Metrics collection and exposition.
//!
//! # Metrics
//! - `source_requests_total` (counter): calls per source and outcome
//! - `source_request_duration_seconds` (histogram): per-source latency
//! - `combinator_requests_total` (counter): outcomes per combinator kind
//! - `cache_lookups_total` (counter): hits and misses
//! - `cache_entries` (gauge): live cache entries
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_source_call(source: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        "source_requests_total",
        "source" => source.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("source_request_duration_seconds", "source" => source.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_combinator_outcome(combinator: &'static str, outcome: &'static str) {
    metrics::counter!(
        "combinator_requests_total",
        "combinator" => combinator,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("cache_entries").set(entries as f64);
}
