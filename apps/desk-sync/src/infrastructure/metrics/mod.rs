//! Prometheus Metrics Module
//!
//! Exposes desk metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ticks**: ticks decoded from the streaming connection
//! - **Sync**: sync cycles, row refreshes and workbook write failures
//! - **Orders**: placements, modifications and cancellations by outcome
//! - **Brokerage**: REST failures by operation
//! - **Subscriptions**: tokens currently subscribed
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the desk HTTP port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)] // Startup-only, a second recorder is a programming error
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
    describe_counter!("desk_ticks_received_total", "Ticks decoded from the ticker");
    describe_counter!(
        "desk_refresh_requests_total",
        "Row refresh requests by outcome"
    );
    describe_counter!("desk_sync_cycles_total", "General sync cycles completed");
    describe_counter!("desk_orders_total", "Order calls by action and outcome");
    describe_counter!(
        "desk_brokerage_errors_total",
        "Brokerage REST failures by operation"
    );
    describe_counter!(
        "desk_workbook_errors_total",
        "Workbook reads or writes that failed"
    );
    describe_counter!("desk_ticker_reconnects_total", "Ticker reconnection attempts");
    describe_gauge!(
        "desk_subscribed_tokens",
        "Instrument tokens currently wanted on the ticker"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Order call kinds.
#[derive(Debug, Clone, Copy)]
pub enum OrderAction {
    /// New order from the INPUT sheet.
    Place,
    /// Modification from the Orders sheet.
    Modify,
    /// Cancellation from the Orders sheet.
    Cancel,
}

impl OrderAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Modify => "modify",
            Self::Cancel => "cancel",
        }
    }
}

const fn outcome(ok: bool) -> &'static str {
    if ok { "ok" } else { "error" }
}

/// Record decoded ticks.
pub fn record_ticks(count: u64) {
    counter!("desk_ticks_received_total").increment(count);
}

/// Record a row refresh request.
pub fn record_refresh_request(accepted: bool) {
    counter!("desk_refresh_requests_total", "outcome" => outcome(accepted)).increment(1);
}

/// Record a completed general sync cycle.
pub fn record_sync_cycle() {
    counter!("desk_sync_cycles_total").increment(1);
}

/// Record an order call.
pub fn record_order(action: OrderAction, ok: bool) {
    counter!(
        "desk_orders_total",
        "action" => action.as_str(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

/// Record a brokerage failure.
pub fn record_brokerage_error(operation: &'static str) {
    counter!("desk_brokerage_errors_total", "operation" => operation).increment(1);
}

/// Record a workbook failure.
pub fn record_workbook_error() {
    counter!("desk_workbook_errors_total").increment(1);
}

/// Record a ticker reconnection attempt.
pub fn record_reconnect() {
    counter!("desk_ticker_reconnects_total").increment(1);
}

/// Update the subscribed-token gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribed_tokens(count: usize) {
    gauge!("desk_subscribed_tokens").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
