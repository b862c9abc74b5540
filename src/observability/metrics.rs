//! Metrics collection and exposition.
//!
//! # Metrics
//! - `broker_proxy_broker_connects_total` (counter): broker connect attempts by outcome
//! - `broker_proxy_broker_up` (gauge): 1=connected, 0=disconnected
//! - `broker_proxy_health_checks_total` (counter): health probes by outcome
//! - `broker_proxy_active_sessions` (gauge): live client sessions per broker
//! - `broker_proxy_sessions_total` (counter): sessions routed per broker
//! - `broker_proxy_session_duration_seconds` (histogram): session lifetime
//! - `broker_proxy_bytes_total` (counter): relayed bytes by direction
//! - `broker_proxy_routing_failures_total` (counter): sessions that never reached a broker
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::pipe::Direction;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_broker_connect(broker: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "broker_proxy_broker_connects_total",
        "broker" => broker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    record_broker_up(broker, success);
}

pub fn record_broker_up(broker: &str, up: bool) {
    metrics::gauge!("broker_proxy_broker_up", "broker" => broker.to_string())
        .set(if up { 1.0 } else { 0.0 });
}

pub fn record_health_check(broker: &str, outcome: &'static str) {
    metrics::counter!(
        "broker_proxy_health_checks_total",
        "broker" => broker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn session_started(broker: &str) {
    metrics::counter!("broker_proxy_sessions_total", "broker" => broker.to_string()).increment(1);
    metrics::gauge!("broker_proxy_active_sessions", "broker" => broker.to_string()).increment(1.0);
}

pub fn session_ended(broker: &str, elapsed: Duration) {
    metrics::gauge!("broker_proxy_active_sessions", "broker" => broker.to_string()).decrement(1.0);
    metrics::histogram!("broker_proxy_session_duration_seconds", "broker" => broker.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_bytes(direction: Direction, bytes: usize) {
    metrics::counter!("broker_proxy_bytes_total", "direction" => direction.as_str())
        .increment(bytes as u64);
}

pub fn record_routing_failure(reason: &'static str) {
    metrics::counter!("broker_proxy_routing_failures_total", "reason" => reason).increment(1);
}
