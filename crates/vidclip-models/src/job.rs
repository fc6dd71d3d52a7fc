//! Job identity and lifecycle stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stage of a job's strictly linear lifecycle.
///
/// `Start → MetadataResolved → Validated → ContentRetrieved →
/// SegmentsSelected → Rendering → Done`, with `Failed` reachable only from
/// the stages for which [`JobStage::can_fail`] is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Start,
    MetadataResolved,
    Validated,
    ContentRetrieved,
    SegmentsSelected,
    Rendering,
    Done,
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Start => "start",
            JobStage::MetadataResolved => "metadata_resolved",
            JobStage::Validated => "validated",
            JobStage::ContentRetrieved => "content_retrieved",
            JobStage::SegmentsSelected => "segments_selected",
            JobStage::Rendering => "rendering",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        }
    }

    /// The stage that follows this one on the success path.
    pub fn next(&self) -> Option<JobStage> {
        match self {
            JobStage::Start => Some(JobStage::MetadataResolved),
            JobStage::MetadataResolved => Some(JobStage::Validated),
            JobStage::Validated => Some(JobStage::ContentRetrieved),
            JobStage::ContentRetrieved => Some(JobStage::SegmentsSelected),
            JobStage::SegmentsSelected => Some(JobStage::Rendering),
            JobStage::Rendering => Some(JobStage::Done),
            JobStage::Done | JobStage::Failed => None,
        }
    }

    /// Whether a job-fatal error may occur while in this stage.
    ///
    /// Selection never fails and rendering failures are per segment.
    pub fn can_fail(&self) -> bool {
        matches!(
            self,
            JobStage::Start
                | JobStage::MetadataResolved
                | JobStage::Validated
                | JobStage::ContentRetrieved
        )
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
