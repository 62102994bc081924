//! Metrics definitions for the marketplace services.
//!
//! This module defines all metrics used throughout the services.
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "ledger_fetch_failures_total",
        "Total number of per-item ledger reads that failed and were skipped"
    );
    describe_counter!(
        "log_scan_failures_total",
        "Total number of event log scans that failed"
    );
    describe_counter!(
        "log_decode_failures_total",
        "Total number of logs skipped because their arguments could not be decoded"
    );
    describe_counter!(
        "snapshots_published_total",
        "Total number of market snapshots published"
    );
    describe_counter!(
        "snapshots_discarded_total",
        "Total number of market snapshots discarded because their inputs changed"
    );
    describe_histogram!(
        "market_pass_duration_seconds",
        "Time taken by one aggregation + catalog pass in seconds"
    );
    describe_counter!(
        "activity_items_total",
        "Total number of activity items reconstructed"
    );
}

/// Record a skipped per-item read.
///
/// # Arguments
/// * `kind` - What was being read ("listing", "auction", "token", "collection", ...)
pub fn record_fetch_failure(kind: &str) {
    counter!("ledger_fetch_failures_total", "kind" => kind.to_string()).increment(1);
}

/// Record a failed log scan.
///
/// # Arguments
/// * `event` - The event name (e.g. "ItemListed")
pub fn record_scan_failure(event: &str) {
    counter!("log_scan_failures_total", "event" => event.to_string()).increment(1);
}

/// Record a log whose arguments could not be decoded.
pub fn record_decode_failure(event: &str) {
    counter!("log_decode_failures_total", "event" => event.to_string()).increment(1);
}

/// Record a published snapshot.
pub fn record_snapshot_published() {
    counter!("snapshots_published_total").increment(1);
}

/// Record a snapshot dropped because it was stale.
pub fn record_snapshot_discarded() {
    counter!("snapshots_discarded_total").increment(1);
}

/// Record reconstructed activity items.
pub fn record_activity_items(count: u64) {
    counter!("activity_items_total").increment(count);
}

/// Record market pass duration.
pub fn record_pass_duration(duration_secs: f64) {
    histogram!("market_pass_duration_seconds").record(duration_secs);
}

/// A timer that automatically records pass duration when dropped.
pub struct PassTimer {
    start: Instant,
}

impl PassTimer {
    /// Start a new pass timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for PassTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PassTimer {
    fn drop(&mut self) {
        record_pass_duration(self.start.elapsed().as_secs_f64());
    }
}
