//! Shared data models for the VidClip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video metadata and the raw-output validation boundary
//! - Segment candidates and rendered clips
//! - Job identity, lifecycle stages and results
//! - The fixed render profile
//! - Source URL validation

pub mod clip;
pub mod encoding;
pub mod job;
pub mod result;
pub mod segment;
pub mod utils;
pub mod video;

// Re-export common types
pub use clip::{clip_file_name, RenderedClip, SkippedSegment};
pub use encoding::RenderProfile;
pub use job::{JobId, JobStage};
pub use result::{PipelineResult, SelectionSource};
pub use segment::{RawSegment, SegmentCandidate, SegmentRejection};
pub use utils::{validate_source_url, SourceValidation, UrlRejection};
pub use video::{MetadataRejection, RawVideoInfo, VideoMetadata};
