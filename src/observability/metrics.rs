//! Metrics collection and exposition.
//!
//! # Metrics
//! - `finbug_requests_total` (counter): requests by method, status
//! - `finbug_request_duration_seconds` (histogram): latency distribution
//! - `finbug_origin_rejections_total` (counter): CORS rejections
//! - `finbug_db_connect_attempts_total` (counter): connect attempts by outcome
//! - `finbug_db_ready` (gauge): 1=connected, 0=not connected
//! - `finbug_route_load_failures_total` (counter): modules that failed to mount
//!
//! Without an installed recorder every call is a no-op, so tests and
//! embedders pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "finbug_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("finbug_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_origin_rejected() {
    counter!("finbug_origin_rejections_total").increment(1);
}

pub fn record_db_connect(outcome: &'static str) {
    counter!("finbug_db_connect_attempts_total", "outcome" => outcome).increment(1);
}

pub fn set_db_ready(ready: bool) {
    gauge!("finbug_db_ready").set(if ready { 1.0 } else { 0.0 });
}

pub fn record_route_load_failure(module: &str) {
    counter!("finbug_route_load_failures_total", "module" => module.to_string()).increment(1);
}
