//! Prometheus Metrics Module
//!
//! Exposes relay metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Ticks**: received, rejected and processed counts, parse errors
//! - **Connector**: upstream connection state and reconnect attempts
//! - **Fan-out**: bus deliveries, client pushes sent and dropped
//! - **Clients**: connected WebSocket clients
//! - **Latency**: tick processing time
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the gateway port. Recording before
//! [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::events::EventKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if another global recorder is already installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "pulse_ticks_received_total",
        "Total ticks received from the exchange feed"
    );
    describe_counter!(
        "pulse_ticks_rejected_total",
        "Total ticks rejected by validation"
    );
    describe_counter!(
        "pulse_ticks_processed_total",
        "Total ticks validated and normalized"
    );
    describe_counter!(
        "pulse_parse_errors_total",
        "Total upstream frames that failed to decode"
    );
    describe_counter!(
        "pulse_reconnects_total",
        "Total upstream reconnection attempts"
    );
    describe_counter!(
        "pulse_bus_deliveries_total",
        "Total events queued to bus subscribers"
    );
    describe_counter!(
        "pulse_client_pushes_total",
        "Total payloads queued to WebSocket clients"
    );
    describe_counter!(
        "pulse_client_pushes_dropped_total",
        "Total payloads dropped because a client buffer was full"
    );

    describe_gauge!(
        "pulse_ws_clients",
        "Number of connected WebSocket clients"
    );
    describe_gauge!(
        "pulse_connector_up",
        "Whether the upstream feed is connected (1) or not (0)"
    );

    describe_histogram!(
        "pulse_tick_processing_seconds",
        "Time to validate, normalize and publish a tick"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a tick received from the exchange feed.
pub fn record_tick_received() {
    counter!("pulse_ticks_received_total").increment(1);
}

/// Record a tick rejected by validation.
pub fn record_tick_rejected() {
    counter!("pulse_ticks_rejected_total").increment(1);
}

/// Record a processed tick.
pub fn record_tick_processed() {
    counter!("pulse_ticks_processed_total").increment(1);
}

/// Record an upstream frame that failed to decode.
pub fn record_parse_error() {
    counter!("pulse_parse_errors_total").increment(1);
}

/// Record an upstream reconnection attempt.
pub fn record_reconnect() {
    counter!("pulse_reconnects_total").increment(1);
}

/// Record events queued to bus subscribers.
pub fn record_bus_delivery(kind: EventKind, count: usize) {
    if count == 0 {
        return;
    }
    counter!("pulse_bus_deliveries_total", "event" => kind.as_str()).increment(count as u64);
}

/// Record payloads queued to WebSocket clients.
pub fn record_pushes_sent(count: usize) {
    counter!("pulse_client_pushes_total").increment(count as u64);
}

/// Record payloads dropped for full client buffers.
pub fn record_pushes_dropped(count: usize) {
    counter!("pulse_client_pushes_dropped_total").increment(count as u64);
}

/// Update the connected WebSocket client count.
#[allow(clippy::cast_precision_loss)]
pub fn set_ws_clients(count: usize) {
    gauge!("pulse_ws_clients").set(count as f64);
}

/// Update the upstream connection gauge.
pub fn set_connector_up(up: bool) {
    gauge!("pulse_connector_up").set(if up { 1.0 } else { 0.0 });
}

/// Record tick processing duration.
pub fn record_processing_duration(duration: Duration) {
    histogram!("pulse_tick_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
