//! Clip-extraction pipeline.
//!
//! This crate provides:
//! - The job orchestrator and its state machine
//! - Segment selection (external scoring with a heuristic fallback)
//! - Transient content cleanup and the per-source busy registry
//! - Configuration, structured job logging and metrics

pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod scoring;
pub mod selector;
pub mod sources;

pub use config::{HeuristicConfig, PipelineConfig, ScoringConfig};
pub use content::TransientContent;
pub use error::{PipelineError, ValidationReason, WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::PipelineOrchestrator;
pub use scoring::{DeepSeekScorer, ScoringRequest, SegmentScorer};
pub use selector::{heuristic_segments, parse_scored_segments, Selection, SegmentSelector, SelectorFailure};
pub use sources::{ActiveSources, SourceGuard};
