//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): dispatched requests by route, status
//! - `proxy_upstream_duration_seconds` (histogram): upstream latency by route
//! - `proxy_rate_limited_total` (counter): requests rejected by the rate limiter
//! - `proxy_cors_rejected_total` (counter): requests rejected by the origin check
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! deployments without an exporter pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!("proxy_requests_total", "route" => route, "status" => status.to_string()).increment(1);
    histogram!("proxy_upstream_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("proxy_rate_limited_total").increment(1);
}

pub fn record_cors_rejected() {
    counter!("proxy_cors_rejected_total").increment(1);
}
