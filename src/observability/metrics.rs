//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_transfers_total` (counter): transfers by outcome (`confirmed` or error kind)
//! - `relay_transfer_duration_seconds` (histogram): end-to-end transfer latency
//! - `relay_endpoint_probe_failures_total` (counter): failed liveness probes by endpoint
//! - `relay_endpoint_bound` (counter): bindings established, by endpoint
//! - `relay_http_requests_total` (counter): HTTP requests by route and status

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_transfer(outcome: &str, started: Instant) {
    counter!("relay_transfers_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("relay_transfer_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_endpoint_probe_failure(endpoint: &str) {
    counter!("relay_endpoint_probe_failures_total", "endpoint" => endpoint.to_string())
        .increment(1);
}

pub fn record_endpoint_bound(endpoint: &str) {
    counter!("relay_endpoint_bound", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_http_request(route: &str, status: u16) {
    counter!(
        "relay_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
