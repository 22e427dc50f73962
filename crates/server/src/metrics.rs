//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the sofa server:
//! - HTTP request metrics (latency, counts)
//! - Pipeline and engine status (collected dynamically)
//! - Everything the core records (polls, stages, downloads)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sofa_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sofa_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sofa_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics (collected dynamically)
// =============================================================================

/// Pipeline running state (1 = running, 0 = stopped).
pub static PIPELINE_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sofa_pipeline_running",
        "Whether the pipeline is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Free admission slots of the download engine.
pub static DOWNLOAD_SLOTS_AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sofa_download_slots_available",
        "Number of free download admission slots",
    )
    .unwrap()
});

/// Failed downloads waiting for their retry delay.
pub static DOWNLOAD_RETRIES_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sofa_download_retries_queued",
        "Number of failed downloads waiting to be retried",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Pipeline
    registry
        .register(Box::new(PIPELINE_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(DOWNLOAD_SLOTS_AVAILABLE.clone()))
        .unwrap();
    registry
        .register(Box::new(DOWNLOAD_RETRIES_QUEUED.clone()))
        .unwrap();

    // Core metrics (poll stage, dispatcher, download engine)
    for metric in sofa_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the pipeline right now.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.pipeline().status().await;
    PIPELINE_RUNNING.set(if status.running { 1 } else { 0 });
    DOWNLOAD_SLOTS_AVAILABLE.set(status.engine.available_slots as i64);
    DOWNLOAD_RETRIES_QUEUED.set(status.engine.queued_retries as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("sofa_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        PIPELINE_RUNNING.set(0);
        DOWNLOAD_SLOTS_AVAILABLE.set(2);
        sofa_core::metrics::DOWNLOADS_STARTED.inc_by(0);

        let output = encode_metrics();
        assert!(output.contains("sofa_pipeline_running"));
        assert!(output.contains("sofa_download_slots_available"));
        assert!(output.contains("sofa_downloads_started_total"));
    }
}
