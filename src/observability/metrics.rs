//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (requests, latency, dispatch outcomes, body bytes)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency by method
//! - `http_route_dispatch_total` (counter): chain outcomes (matched, default, not_matched)
//! - `http_entity_bytes_total` (counter): body bytes delivered by entities
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Low-cardinality labels only (no paths)

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of evaluating a route chain.
pub fn record_dispatch(outcome: &'static str) {
    counter!("http_route_dispatch_total", "outcome" => outcome).increment(1);
}

/// Record body bytes delivered by an entity over its lifetime.
pub fn record_entity_bytes(bytes: u64) {
    if bytes > 0 {
        counter!("http_entity_bytes_total").increment(bytes);
    }
}
