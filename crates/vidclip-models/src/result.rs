//! Terminal output of a pipeline job.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clip::{RenderedClip, SkippedSegment};
use crate::job::JobId;
use crate::video::VideoMetadata;

/// Where the selected segments came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// External scoring service
    External,
    /// Deterministic fallback
    Heuristic,
}

impl SelectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionSource::External => "external",
            SelectionSource::Heuristic => "heuristic",
        }
    }
}

/// Result of one successful job. Owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineResult {
    pub job_id: JobId,
    pub source_url: String,
    pub video_id: String,
    pub metadata: VideoMetadata,

    /// Rendered clips in original segment order
    pub clips: Vec<RenderedClip>,

    /// Segments whose render failed
    #[serde(default)]
    pub skipped: Vec<SkippedSegment>,

    pub requested_segment_count: usize,
    pub succeeded_segment_count: usize,
    pub total_output_bytes: u64,
    pub selection_source: SelectionSource,
    pub processed_at: DateTime<Utc>,
}

impl PipelineResult {
    /// True when segments were requested but none rendered.
    ///
    /// Distinct from a job-level failure: earlier stages succeeded.
    pub fn all_segments_failed(&self) -> bool {
        self.requested_segment_count > 0 && self.succeeded_segment_count == 0
    }

    pub fn total_output_mb(&self) -> f64 {
        self.total_output_bytes as f64 / (1024.0 * 1024.0)
    }
}
