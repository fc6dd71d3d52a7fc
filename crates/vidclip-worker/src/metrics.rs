//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "vidclip_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "vidclip_job_duration_seconds";
    pub const SEGMENTS_RENDERED_TOTAL: &str = "vidclip_segments_rendered_total";
    pub const SEGMENTS_FAILED_TOTAL: &str = "vidclip_segments_failed_total";
    pub const SELECTOR_FALLBACK_TOTAL: &str = "vidclip_selector_fallback_total";
}

/// Record a finished job. `outcome` is "success" or an error kind.
pub fn record_job(outcome: &'static str, duration_secs: f64) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

pub fn record_segments(rendered: usize, failed: usize) {
    counter!(names::SEGMENTS_RENDERED_TOTAL).increment(rendered as u64);
    counter!(names::SEGMENTS_FAILED_TOTAL).increment(failed as u64);
}

pub fn record_selector_fallback(reason: &'static str) {
    counter!(names::SELECTOR_FALLBACK_TOTAL, "reason" => reason).increment(1);
}
