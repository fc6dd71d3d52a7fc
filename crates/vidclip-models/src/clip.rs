//! Rendered clip models.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::segment::SegmentCandidate;

/// A segment that was successfully rendered to a standalone file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderedClip {
    /// The segment as actually rendered (end possibly moved earlier)
    #[serde(flatten)]
    pub segment: SegmentCandidate,

    pub file_path: PathBuf,

    /// Always > 0
    pub file_size_bytes: u64,

    pub rendered_duration_seconds: f64,

    /// Target resolution/aspect descriptor, e.g. "720x1280 (vertical)"
    pub format: String,
}

impl RenderedClip {
    /// File name of the artifact, relative to the output directory.
    pub fn file_name(&self) -> Option<&str> {
        self.file_path.file_name().and_then(|n| n.to_str())
    }

    pub fn size_mb(&self) -> f64 {
        self.file_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// A segment whose render failed. Recorded, never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedSegment {
    /// Position in the selected segment list
    pub index: usize,
    pub title: String,
    pub reason: String,
}

/// Output file name for the `index`-th (0-based) segment of a video.
pub fn clip_file_name(video_id: &str, index: usize) -> String {
    format!("{}_clip{}.mp4", video_id, index + 1)
}
