//! Worker and pipeline error types.

use thiserror::Error;
use vidclip_media::MediaError;
use vidclip_models::{JobStage, UrlRejection};

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors from worker plumbing (scoring client, configuration).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Scoring request failed: {0}")]
    ScoringFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl WorkerError {
    pub fn scoring_failed(msg: impl Into<String>) -> Self {
        Self::ScoringFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Why a job was rejected before any content was retrieved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationReason {
    #[error("invalid source URL: {0}")]
    InvalidUrl(#[source] UrlRejection),

    #[error("video is too short ({duration_secs}s, minimum {min_secs}s)")]
    TooShort { duration_secs: u64, min_secs: u64 },

    #[error("video is too long ({duration_secs}s, maximum {max_secs}s)")]
    TooLong { duration_secs: u64, max_secs: u64 },
}

/// Job-fatal pipeline errors.
///
/// Every variant names the source and `stage`, the last stage the job
/// reached before failing. A retrieval failure therefore reports
/// `validated`, since `content_retrieved` was never entered.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("metadata unavailable for {source_id} (stage: {stage}): {cause}")]
    MetadataUnavailable {
        source_id: String,
        stage: JobStage,
        #[source]
        cause: MediaError,
    },

    #[error("validation failed for {source_id}: {reason}")]
    Validation {
        source_id: String,
        stage: JobStage,
        #[source]
        reason: ValidationReason,
    },

    #[error("retrieval failed for {source_id} (stage: {stage}): {cause}")]
    RetrievalFailed {
        source_id: String,
        stage: JobStage,
        #[source]
        cause: MediaError,
    },

    #[error("a job for {source_id} is already running")]
    SourceBusy { source_id: String, stage: JobStage },

    #[error("job for {source_id} cancelled (stage: {stage})")]
    Cancelled { source_id: String, stage: JobStage },

    #[error("I/O error for {source_id} (stage: {stage}): {cause}")]
    Io {
        source_id: String,
        stage: JobStage,
        #[source]
        cause: std::io::Error,
    },
}

impl PipelineError {
    /// Last stage the job reached before it failed.
    pub fn stage(&self) -> JobStage {
        match self {
            PipelineError::MetadataUnavailable { stage, .. }
            | PipelineError::Validation { stage, .. }
            | PipelineError::RetrievalFailed { stage, .. }
            | PipelineError::SourceBusy { stage, .. }
            | PipelineError::Cancelled { stage, .. }
            | PipelineError::Io { stage, .. } => *stage,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            PipelineError::MetadataUnavailable { source_id, .. }
            | PipelineError::Validation { source_id, .. }
            | PipelineError::RetrievalFailed { source_id, .. }
            | PipelineError::SourceBusy { source_id, .. }
            | PipelineError::Cancelled { source_id, .. }
            | PipelineError::Io { source_id, .. } => source_id,
        }
    }

    /// Caused by the request rather than the system (4xx at an HTTP boundary).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation { .. } | PipelineError::SourceBusy { .. }
        )
    }

    /// Whether running the same job again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::MetadataUnavailable { .. }
                | PipelineError::RetrievalFailed { .. }
                | PipelineError::SourceBusy { .. }
                | PipelineError::Io { .. }
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MetadataUnavailable { .. } => "metadata_unavailable",
            PipelineError::Validation { .. } => "validation",
            PipelineError::RetrievalFailed { .. } => "retrieval_failed",
            PipelineError::SourceBusy { .. } => "source_busy",
            PipelineError::Cancelled { .. } => "cancelled",
            PipelineError::Io { .. } => "io",
        }
    }
}
