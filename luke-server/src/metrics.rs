//! Prometheus metrics for luke-server.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.
//! Recording is a no-op until a recorder is installed, so library users and
//! tests need not install one.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// Metric names as constants for consistency
const COMMANDS_TOTAL: &str = "luke_commands_total";
const CONTROLLER_CONNECTIONS_ACTIVE: &str = "luke_controller_connections_active";
const SURFACE_CONNECTIONS_ACTIVE: &str = "luke_surface_connections_active";
const SURFACE_UPDATES_TOTAL: &str = "luke_surface_updates_total";
const EXTERNAL_CHANGES_TOTAL: &str = "luke_external_changes_total";
const VALIDATION_FAILURES_TOTAL: &str = "luke_validation_failures_total";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record a controller or surface command.
///
/// # Arguments
///
/// * `command` - Command type (`draw_circle`, `set_file`, ...)
/// * `success` - Whether the command succeeded
pub fn record_command(command: &str, success: bool) {
    counter!(
        COMMANDS_TOTAL,
        "command" => command.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment active controller connections.
pub fn inc_controller_connections() {
    gauge!(CONTROLLER_CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement active controller connections.
pub fn dec_controller_connections() {
    gauge!(CONTROLLER_CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Increment active rendering-surface connections.
pub fn inc_surface_connections() {
    gauge!(SURFACE_CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement active rendering-surface connections.
pub fn dec_surface_connections() {
    gauge!(SURFACE_CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record one update pushed to a rendering surface.
pub fn record_surface_update() {
    counter!(SURFACE_UPDATES_TOTAL).increment(1);
}

/// Record the handling of an external document change.
///
/// # Arguments
///
/// * `outcome` - "reloaded", "ignored" or "failed"
pub fn record_external_change(outcome: &str) {
    counter!(
        EXTERNAL_CHANGES_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `validation_type` - What failed (`message_size`, `file_path`, `element`, ...)
pub fn record_validation_failure(validation_type: &str) {
    counter!(
        VALIDATION_FAILURES_TOTAL,
        "type" => validation_type.to_string()
    )
    .increment(1);
}
