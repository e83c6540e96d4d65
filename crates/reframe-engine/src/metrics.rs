//! Engine metrics.
//!
//! Recorded through the `metrics` facade; the host decides whether a
//! recorder is installed.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const KEYFRAMES_TOTAL: &str = "reframe_keyframes_total";
    pub const DETECTOR_FALLBACKS_TOTAL: &str = "reframe_detector_fallbacks_total";
    pub const DECODE_SKIPS_TOTAL: &str = "reframe_decode_skips_total";
    pub const CLASSIFY_DURATION_SECONDS: &str = "reframe_classify_duration_seconds";
    pub const GENERATE_DURATION_SECONDS: &str = "reframe_generate_duration_seconds";
}

/// Record keyframes produced by one trajectory run.
pub fn record_keyframes(strategy: &str, count: usize) {
    let labels = [("strategy", strategy.to_string())];
    counter!(names::KEYFRAMES_TOTAL, &labels).increment(count as u64);
}

/// Record one use of the heuristic region in place of a backend result.
pub fn record_detector_fallback(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::DETECTOR_FALLBACKS_TOTAL, &labels).increment(1);
}

/// Record a sample skipped because its frame failed to decode.
pub fn record_decode_skip(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::DECODE_SKIPS_TOTAL, &labels).increment(1);
}

/// Record classification duration.
pub fn record_classify_duration(strategy: &str, duration_secs: f64) {
    let labels = [("strategy", strategy.to_string())];
    histogram!(names::CLASSIFY_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record trajectory generation duration.
pub fn record_generate_duration(strategy: &str, duration_secs: f64) {
    let labels = [("strategy", strategy.to_string())];
    histogram!(names::GENERATE_DURATION_SECONDS, &labels).record(duration_secs);
}
