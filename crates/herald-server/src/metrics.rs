//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Fails if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections admitted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Outbound frames dropped on a full or closed queue (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// Connection attempts refused (counter, labels: reason).
pub const ADMISSIONS_REJECTED_TOTAL: &str = "admissions_rejected_total";
/// Envelopes routed (counter, labels: strategy).
pub const EVENTS_ROUTED_TOTAL: &str = "events_routed_total";
/// Frames handed to connections (counter).
pub const EVENT_DELIVERIES_TOTAL: &str = "event_deliveries_total";
/// Envelopes that matched no live connection (counter, labels: strategy).
pub const EVENT_DISPATCH_MISSES_TOTAL: &str = "event_dispatch_misses_total";
/// Queue messages received (counter).
pub const QUEUE_MESSAGES_TOTAL: &str = "queue_messages_total";
/// Queue messages that failed to decode (counter).
pub const QUEUE_DECODE_FAILURES_TOTAL: &str = "queue_decode_failures_total";
/// Broker connection attempts after a failure or loss (counter).
pub const BROKER_RECONNECTS_TOTAL: &str = "broker_reconnects_total";
/// Whether the consumer currently holds a broker channel (gauge, 0 or 1).
pub const BROKER_CONNECTED: &str = "broker_connected";
