//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bff_requests_total` (counter): requests by decision, method, status
//! - `bff_request_duration_seconds` (histogram): latency by decision
//! - `bff_upstream_failures_total` (counter): proxy failures by kind
//! - `bff_module_rebuilds_total` (counter): development rebuilds by outcome
//! - `bff_asset_rejections_total` (counter): traversal attempts
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(decision: &'static str, method: &str, status: u16, start: Instant) {
    counter!(
        "bff_requests_total",
        "decision" => decision,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("bff_request_duration_seconds", "decision" => decision)
        .record(start.elapsed().as_secs_f64());
}

/// Record a failed upstream exchange (`connect`, `timeout`, `protocol`).
pub fn record_upstream_failure(kind: &'static str) {
    counter!("bff_upstream_failures_total", "kind" => kind).increment(1);
}

/// Record a development rebuild (`compiled`, `reused`, `failed`).
pub fn record_module_rebuild(outcome: &'static str) {
    counter!("bff_module_rebuilds_total", "outcome" => outcome).increment(1);
}

/// Record a rejected static asset path.
pub fn record_asset_rejection() {
    counter!("bff_asset_rejections_total").increment(1);
}
