//! Metrics collection for `QuizRoom`.
//!
//! Provides Prometheus-compatible counters and gauges describing session
//! flow, player activity, and event delivery. All label values are fixed
//! strings derived from internal enums, so cardinality is bounded.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::QuizRoomError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`.  When `None`, the recorder is installed without
/// an HTTP endpoint (metrics are recorded internally and can be read
/// programmatically).
///
/// # Errors
///
/// Returns `QuizRoomError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), QuizRoomError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| QuizRoomError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "quizroom_phase_transitions_total",
        "Total number of session phase transitions"
    );
    describe_counter!(
        "quizroom_players_registered_total",
        "Total number of players registered"
    );
    describe_counter!(
        "quizroom_answers_total",
        "Total number of answer submissions by outcome"
    );
    describe_counter!(
        "quizroom_listener_fires_total",
        "Total number of listener callbacks invoked by channel"
    );
    describe_counter!(
        "quizroom_graphic_drops_total",
        "Graphic updates dropped because the delivery queue was full"
    );
    describe_gauge!(
        "quizroom_sse_connections",
        "Number of currently open event stream connections"
    );
}

/// Sets the number of open event stream connections.
#[allow(clippy::cast_precision_loss)]
pub fn set_sse_connections(count: u64) {
    gauge!("quizroom_sse_connections").set(count as f64);
}
