//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests by method, status
//! - `guard_request_duration_seconds` (histogram): end-to-end latency
//! - `guard_rejections_total` (counter): normalized errors by code
//! - `guard_security_blocks_total` (counter): blocks by reason
//! - `guard_throttles_total` (counter): throttles by window
//! - `guard_audit_failures_total` (counter): audit writes that fell back
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! metrics-disabled deployments pay nothing.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ErrorCode;
use crate::security::counters::Window;
use crate::security::inspector::BlockReason;

#[derive(Debug, thiserror::Error)]
#[error("failed to start metrics exporter: {0}")]
pub struct MetricsError(String);

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError(e.to_string()))?;
    tracing::info!(address = %addr, "Prometheus metrics exporter started");
    Ok(())
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    counter!(
        "guard_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("guard_request_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_rejection(code: ErrorCode) {
    counter!("guard_rejections_total", "code" => code.as_str()).increment(1);
}

pub fn record_security_block(reason: BlockReason) {
    counter!("guard_security_blocks_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_throttle(window: Window) {
    counter!("guard_throttles_total", "window" => window.as_str()).increment(1);
}

pub fn record_audit_failure() {
    counter!("guard_audit_failures_total").increment(1);
}
