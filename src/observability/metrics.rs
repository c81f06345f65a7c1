//! Metrics collection and exposition.
//!
//! # Metrics
//! - `entrypoints_dynamic` (gauge): dynamic listeners by transport
//! - `entrypoints_listener_starts_total` (counter): listeners started
//! - `entrypoints_listener_stops_total` (counter): listeners stopped
//! - `entrypoints_bind_failures_total` (counter): failed binds
//! - `entrypoints_malformed_names_total` (counter): skipped names by reason
//! - `entrypoints_invalid_overrides_total` (counter): unparsable overrides
//! - `entrypoints_reconciliations_total` (counter): reconciliation passes
//! - `entrypoints_active_connections` (gauge): open connections per entry point
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::entrypoint::Transport;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dynamic_listeners(transport: Transport, count: usize) {
    gauge!("entrypoints_dynamic", "transport" => transport.as_str()).set(count as f64);
}

pub fn record_listener_started(transport: Transport) {
    counter!("entrypoints_listener_starts_total", "transport" => transport.as_str()).increment(1);
}

pub fn record_listener_stopped(transport: Transport) {
    counter!("entrypoints_listener_stops_total", "transport" => transport.as_str()).increment(1);
}

pub fn record_bind_failure(transport: Transport) {
    counter!("entrypoints_bind_failures_total", "transport" => transport.as_str()).increment(1);
}

pub fn record_malformed_name(reason: &'static str) {
    counter!("entrypoints_malformed_names_total", "reason" => reason).increment(1);
}

pub fn record_invalid_override() {
    counter!("entrypoints_invalid_overrides_total").increment(1);
}

pub fn record_reconciliation() {
    counter!("entrypoints_reconciliations_total").increment(1);
}

pub fn record_active_connections(entry_point: &str, count: u64) {
    gauge!("entrypoints_active_connections", "entry_point" => entry_point.to_string()).set(count as f64);
}
