//! Prometheus metrics for the acquisition pipeline.
//!
//! Registered into the server's registry through [`all_metrics`].

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Poll Metrics
// =============================================================================

/// Items forwarded by each provider.
pub static ITEMS_POLLED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sofa_items_polled_total", "Total items forwarded by providers"),
        &["provider"],
    )
    .unwrap()
});

/// Failed provider polls.
pub static POLL_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sofa_poll_errors_total", "Total failed provider polls"),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Stage invocations that ended in an error, by stage.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sofa_stage_failures_total", "Total failed stage invocations"),
        &["stage"], // "scrape", "extract", "download"
    )
    .unwrap()
});

/// Sources found by the scrape stage.
pub static SOURCES_FOUND: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("sofa_sources_found_total", "Total sources found by scrapers").unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Downloads handed to a getter.
pub static DOWNLOADS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("sofa_downloads_started_total", "Total downloads started").unwrap()
});

/// Downloads completed successfully.
pub static DOWNLOADS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sofa_downloads_completed_total",
        "Total downloads completed successfully",
    )
    .unwrap()
});

/// Downloads that failed, at start or during transfer.
pub static DOWNLOADS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("sofa_downloads_failed_total", "Total downloads failed").unwrap()
});

/// Submissions dropped because the location was already in flight.
pub static DUPLICATES_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sofa_download_duplicates_total",
        "Total duplicate download submissions skipped",
    )
    .unwrap()
});

/// Retry attempts scheduled.
pub static DOWNLOAD_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sofa_download_retries_total",
        "Total download retries scheduled",
    )
    .unwrap()
});

/// Transfers currently in flight.
pub static DOWNLOADS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("sofa_downloads_in_flight", "Number of transfers in flight").unwrap()
});

/// Duration of completed transfers in seconds.
pub static DOWNLOAD_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "sofa_download_duration_seconds",
            "Duration of completed transfers",
        )
        .buckets(vec![
            1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0,
        ]),
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Poll
        Box::new(ITEMS_POLLED.clone()),
        Box::new(POLL_ERRORS.clone()),
        // Pipeline
        Box::new(STAGE_FAILURES.clone()),
        Box::new(SOURCES_FOUND.clone()),
        // Downloads
        Box::new(DOWNLOADS_STARTED.clone()),
        Box::new(DOWNLOADS_COMPLETED.clone()),
        Box::new(DOWNLOADS_FAILED.clone()),
        Box::new(DUPLICATES_SKIPPED.clone()),
        Box::new(DOWNLOAD_RETRIES.clone()),
        Box::new(DOWNLOADS_IN_FLIGHT.clone()),
        Box::new(DOWNLOAD_DURATION.clone()),
    ]
}
