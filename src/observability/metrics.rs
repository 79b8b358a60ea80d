//! Metrics collection and exposition.
//!
//! # Metrics
//! - `confsync_fetch_total` (counter): fetch attempts by namespace, outcome
//! - `confsync_installs_total` (counter): snapshots installed by namespace
//! - `confsync_persist_failures_total` (counter): failed disk writes
//! - `confsync_listener_failures_total` (counter): failed change listeners
//! - `confsync_namespace_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Outcome label for a fetch attempt.
#[derive(Debug, Clone, Copy)]
pub enum FetchOutcomeLabel {
    Unchanged,
    Updated,
    Failed,
}

impl FetchOutcomeLabel {
    fn as_str(self) -> &'static str {
        match self {
            FetchOutcomeLabel::Unchanged => "unchanged",
            FetchOutcomeLabel::Updated => "updated",
            FetchOutcomeLabel::Failed => "failed",
        }
    }
}

pub fn record_fetch(namespace: &str, outcome: FetchOutcomeLabel) {
    counter!(
        "confsync_fetch_total",
        "namespace" => namespace.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_install(namespace: &str) {
    counter!("confsync_installs_total", "namespace" => namespace.to_string()).increment(1);
}

pub fn record_persist_failure(namespace: &str) {
    counter!("confsync_persist_failures_total", "namespace" => namespace.to_string()).increment(1);
}

pub fn record_listener_failure(namespace: &str) {
    counter!("confsync_listener_failures_total", "namespace" => namespace.to_string()).increment(1);
}

pub fn record_namespace_health(namespace: &str, healthy: bool) {
    gauge!("confsync_namespace_healthy", "namespace" => namespace.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
