//! Prometheus metrics for the sync core
//!
//! Provides observability metrics for long-running `watch` sessions.
//!
//! The registry is process-wide. Per-client gauges carry a `repository`
//! label so several clients in one process report side by side.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Histogram: sync cycle duration (seconds) by outcome
    pub static ref SYNC_DURATION: HistogramVec = register_histogram_vec!(
        "issuechat_sync_duration_seconds",
        "Duration of sync cycles",
        &["outcome"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to create sync_duration metric");

    /// Counter: sync cycles by status (success, error, busy)
    pub static ref SYNC_CYCLES: CounterVec = register_counter_vec!(
        "issuechat_sync_cycles_total",
        "Total sync cycles by status",
        &["status"]
    )
    .expect("Failed to create sync_cycles metric");

    /// Counter: transport errors by kind and operation
    pub static ref TRANSPORT_ERRORS: CounterVec = register_counter_vec!(
        "issuechat_transport_errors_total",
        "Total transport errors by kind",
        &["kind", "operation"]
    )
    .expect("Failed to create transport_errors metric");

    /// Counter: reconnect attempts by outcome
    pub static ref RECONNECT_ATTEMPTS: CounterVec = register_counter_vec!(
        "issuechat_reconnect_attempts_total",
        "Total reconnect attempts by outcome",
        &["outcome"]
    )
    .expect("Failed to create reconnect_attempts metric");

    /// Counter: messages sent by status
    pub static ref MESSAGES_SENT: CounterVec = register_counter_vec!(
        "issuechat_messages_sent_total",
        "Total messages sent by status",
        &["status"]
    )
    .expect("Failed to create messages_sent metric");

    /// Gauge: connection state per repository (0 = disconnected, 1 = connecting, 2 = connected, 3 = error)
    pub static ref CONNECTION_STATE: GaugeVec = register_gauge_vec!(
        "issuechat_connection_state",
        "Connection state (0 = disconnected, 1 = connecting, 2 = connected, 3 = error)",
        &["repository"]
    )
    .expect("Failed to create connection_state metric");

    /// Gauge: messages in the current snapshot, per repository
    pub static ref SNAPSHOT_SIZE: GaugeVec = register_gauge_vec!(
        "issuechat_snapshot_messages",
        "Number of messages in the current snapshot",
        &["repository"]
    )
    .expect("Failed to create snapshot_messages metric");
}

/// Record a sync cycle duration
pub fn record_sync_duration(outcome: &str, duration_secs: f64) {
    SYNC_DURATION
        .with_label_values(&[outcome])
        .observe(duration_secs);
}

/// Record a sync cycle completion
pub fn record_sync_cycle(status: &str) {
    SYNC_CYCLES.with_label_values(&[status]).inc();
}

/// Increment transport error counter
pub fn record_transport_error(kind: &str, operation: &str) {
    TRANSPORT_ERRORS.with_label_values(&[kind, operation]).inc();
}

/// Record a reconnect attempt outcome
pub fn record_reconnect(outcome: &str) {
    RECONNECT_ATTEMPTS.with_label_values(&[outcome]).inc();
}

/// Record a send attempt outcome
pub fn record_message_sent(status: &str) {
    MESSAGES_SENT.with_label_values(&[status]).inc();
}

/// Set connection state gauge for a repository
pub fn set_connection_state(repository: &str, code: u8) {
    CONNECTION_STATE
        .with_label_values(&[repository])
        .set(f64::from(code));
}

/// Set snapshot size gauge for a repository
pub fn set_snapshot_size(repository: &str, count: usize) {
    SNAPSHOT_SIZE
        .with_label_values(&[repository])
        .set(count as f64);
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::IssueChatError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::IssueChatError::Other(format!("Metrics are not UTF-8: {}", e)))
}
