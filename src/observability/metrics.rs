//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dynaproxy_requests_total` (counter): requests by operation, status
//! - `dynaproxy_request_duration_seconds` (histogram): latency by operation
//! - `dynaproxy_open_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - The `metrics` facade is always called; without an installed recorder it is a no-op
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(operation: &str, status: u16, start: Instant) {
    let labels = [
        ("operation", operation.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("dynaproxy_requests_total", &labels).increment(1);
    metrics::histogram!("dynaproxy_request_duration_seconds", "operation" => operation.to_string())
        .record(start.elapsed().as_secs_f64());
}
