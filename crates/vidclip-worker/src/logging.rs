//! Structured job logging utilities.
//!
//! Every line logged through [`JobLogger`] carries the job ID, the source
//! and the operation, so one job can be followed through interleaved output.

use tracing::{error, info, warn, Span};
use vidclip_models::{JobId, JobStage};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    source_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job, source and operation.
    pub fn new(job_id: &JobId, source_id: &str, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            source_id: source_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            source_id = %self.source_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a state machine transition.
    pub fn log_stage(&self, stage: JobStage) {
        info!(
            job_id = %self.job_id,
            source_id = %self.source_id,
            operation = %self.operation,
            stage = %stage,
            "Job stage: {}", stage
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            source_id = %self.source_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            source_id = %self.source_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    /// Log a job-fatal error along with the last stage the job reached.
    pub fn log_error(&self, stage: JobStage, message: &str) {
        error!(
            job_id = %self.job_id,
            source_id = %self.source_id,
            operation = %self.operation,
            stage = %stage,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            source_id = %self.source_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Span that tags everything logged inside the job, including the
    /// media adapters.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            source_id = %self.source_id,
            operation = %self.operation
        )
    }
}
