/// Metrics and telemetry
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Actor creations and deletions
/// - Calls to the external directory
/// - Statistics requests by output format

use crate::error::{CastError, CastResult};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Actor Metrics ==========

    /// Actors added from the directory
    pub static ref ACTORS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "actors_created_total",
        "Total number of actors added from the directory"
    )
    .unwrap();

    /// Actors removed
    pub static ref ACTORS_DELETED_TOTAL: IntCounter = register_int_counter!(
        "actors_deleted_total",
        "Total number of actors deleted"
    )
    .unwrap();

    // ========== Directory Metrics ==========

    /// Directory calls by endpoint and outcome
    pub static ref DIRECTORY_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "directory_requests_total",
        "Total number of requests to the external actor directory",
        &["endpoint", "outcome"]
    )
    .unwrap();

    // ========== Statistics Metrics ==========

    /// Statistics summaries by output format
    pub static ref STATISTICS_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "statistics_requests_total",
        "Total number of statistics summaries produced",
        &["format"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> CastResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| CastError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| CastError::Internal(format!("Metrics are not UTF-8: {}", e)))
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a call to the external directory
pub fn record_directory_request(endpoint: &str, outcome: &str) {
    DIRECTORY_REQUESTS_TOTAL
        .with_label_values(&[endpoint, outcome])
        .inc();
}

/// Record a statistics summary
pub fn record_statistics_request(format: &str) {
    STATISTICS_REQUESTS_TOTAL.with_label_values(&[format]).inc();
}
