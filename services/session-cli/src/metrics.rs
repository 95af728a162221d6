//! Prometheus metrics exposition
//!
//! The library crates emit through the `metrics` facade; this module installs
//! the recorder and describes the counters they use:
//!
//! - `session_requests_total` (counter): label `outcome`
//! - `session_refresh_total` (counter): label `outcome`
//! - `session_refresh_waiters_total` (counter)
//! - `session_transport_retries_total` (counter)

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Must run before the pipeline is used, otherwise early counters go to the
/// no-op recorder.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe();
    handle
}

/// Attach help text to every counter the client emits.
pub fn describe() {
    metrics::describe_counter!(
        "session_requests_total",
        "Logical requests completed through the pipeline, by outcome"
    );
    metrics::describe_counter!(
        "session_refresh_total",
        "Token refresh cycles, by outcome"
    );
    metrics::describe_counter!(
        "session_refresh_waiters_total",
        "Requests that joined an in-flight refresh instead of starting one"
    );
    metrics::describe_counter!(
        "session_transport_retries_total",
        "Transport-level retry attempts"
    );
}
