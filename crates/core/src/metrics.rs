//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scanning (scans run, rows dispatched for resolution)
//! - Artwork resolution (by origin, failures)
//! - Gallery projection (rebuilds, incremental patches)

use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Scanning
// =============================================================================

/// Scans run total.
pub static SCANS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("posterboard_scans_total", "Total listing scans run").unwrap()
});

/// Rows handed to the artwork resolver.
pub static ROWS_DISPATCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "posterboard_rows_dispatched_total",
        "Rows dispatched for artwork resolution",
    )
    .unwrap()
});

/// Rows annotated, by path.
pub static ROWS_ANNOTATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("posterboard_rows_annotated_total", "Rows annotated with a poster"),
        &["path"], // "inline", "resolved"
    )
    .unwrap()
});

// =============================================================================
// Artwork
// =============================================================================

/// Artwork resolutions by origin.
pub static ARTWORK_RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "posterboard_artwork_resolutions_total",
            "Artwork resolutions by origin",
        ),
        &["origin"], // "cache", "detail_page", "placeholder"
    )
    .unwrap()
});

/// Detail page fetches that failed; the placeholder is used instead.
pub static ARTWORK_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "posterboard_artwork_failures_total",
        "Detail page fetches that failed",
    )
    .unwrap()
});

// =============================================================================
// Gallery
// =============================================================================

/// Gallery updates by kind.
pub static GALLERY_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("posterboard_gallery_updates_total", "Gallery updates by kind"),
        &["kind"], // "rebuilt", "patched", "rebuild_scheduled"
    )
    .unwrap()
});

/// All core metrics, for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(SCANS_TOTAL.clone()),
        Box::new(ROWS_DISPATCHED.clone()),
        Box::new(ROWS_ANNOTATED.clone()),
        Box::new(ARTWORK_RESOLUTIONS.clone()),
        Box::new(ARTWORK_FAILURES.clone()),
        Box::new(GALLERY_UPDATES.clone()),
    ]
}
