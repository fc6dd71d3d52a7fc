//! End-to-end clip extraction for one source URL.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, Instrument};

use vidclip_media::command::cancelled;
use vidclip_media::{
    check_ffmpeg, check_ffprobe, check_ytdlp, ClipRenderer, ContentRetriever, FfmpegClipRenderer, MediaError,
    MetadataResolver, YtDlpMetadataResolver, YtDlpRetriever,
};
use vidclip_models::{
    clip_file_name, validate_source_url, JobId, JobStage, PipelineResult, RenderedClip,
    SegmentCandidate, SkippedSegment, VideoMetadata,
};

use crate::config::PipelineConfig;
use crate::content::TransientContent;
use crate::error::{PipelineError, ValidationReason, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::scoring::{DeepSeekScorer, SegmentScorer};
use crate::selector::SegmentSelector;
use crate::sources::ActiveSources;

const OPERATION: &str = "clip_extraction";

/// Where a running job is, for naming the stage of a cancellation.
#[derive(Debug, Default)]
struct StageTracker {
    inner: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    stage: JobStage,
    source_id: Option<String>,
}

impl StageTracker {
    fn enter(&self, stage: JobStage, logger: &JobLogger) {
        let mut state = self.lock();
        debug_assert_eq!(state.stage.next(), Some(stage), "job stages advance one at a time");
        state.stage = stage;
        drop(state);
        logger.log_stage(stage);
    }

    fn set_source(&self, source_id: &str) {
        self.lock().source_id = Some(source_id.to_string());
    }

    fn snapshot(&self, fallback_source: &str) -> (String, JobStage) {
        let state = self.lock();
        let source_id = state
            .source_id
            .clone()
            .unwrap_or_else(|| fallback_source.to_string());
        (source_id, state.stage)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drives a job through
/// `Start → MetadataResolved → Validated → ContentRetrieved →
/// SegmentsSelected → Rendering → Done`.
///
/// Only the stages up to content retrieval can fail the job. Selection
/// always yields candidates and render failures are recorded per segment,
/// so a job that reaches `SegmentsSelected` ends in `Done`.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    resolver: Arc<dyn MetadataResolver>,
    retriever: Arc<dyn ContentRetriever>,
    selector: SegmentSelector,
    renderer: Arc<dyn ClipRenderer>,
    active: ActiveSources,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        resolver: Arc<dyn MetadataResolver>,
        retriever: Arc<dyn ContentRetriever>,
        selector: SegmentSelector,
        renderer: Arc<dyn ClipRenderer>,
    ) -> Self {
        Self {
            config,
            resolver,
            retriever,
            selector,
            renderer,
            active: ActiveSources::new(),
        }
    }

    /// Build the production pipeline: yt-dlp, FFmpeg and, when an API key
    /// is configured, DeepSeek scoring.
    pub fn from_config(config: PipelineConfig) -> WorkerResult<Self> {
        config.validate()?;

        let ytdlp = check_ytdlp()?;
        let ffmpeg = check_ffmpeg()?;
        let ffprobe = check_ffprobe()?;
        debug!(
            ytdlp = %ytdlp.display(),
            ffmpeg = %ffmpeg.display(),
            ffprobe = %ffprobe.display(),
            "Found external tools"
        );

        let resolver = Arc::new(YtDlpMetadataResolver::new(config.metadata_timeout));
        let retriever = Arc::new(YtDlpRetriever::new(
            config.formats.clone(),
            config.retrieval_attempt_timeout,
            config.min_content_bytes,
        ));
        let renderer = Arc::new(FfmpegClipRenderer::new(
            config.render_profile.clone(),
            config.max_clip_secs,
            config.render_timeout.as_secs(),
        ));

        let scorer: Option<Arc<dyn SegmentScorer>> = if config.scoring.is_configured() {
            Some(Arc::new(DeepSeekScorer::new(&config.scoring)?))
        } else {
            info!("DEEPSEEK_API_KEY not set, segments will come from the heuristic");
            None
        };
        let selector = SegmentSelector::new(scorer, config.scoring.clone(), config.heuristic.clone());

        Ok(Self::new(config, resolver, retriever, selector, renderer))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Registry of sources with a job in flight.
    pub fn active_sources(&self) -> &ActiveSources {
        &self.active
    }

    /// Run one job to completion.
    pub async fn run(&self, source_url: &str) -> Result<PipelineResult, PipelineError> {
        let (_never, cancel_rx) = watch::channel(false);
        self.run_with_cancel(source_url, cancel_rx).await
    }

    /// Run one job, abandoning it as soon as `cancel_rx` turns true.
    ///
    /// On cancellation the job future is dropped. That kills any running
    /// subprocess, removes the transient content and frees the source.
    pub async fn run_with_cancel(
        &self,
        source_url: &str,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<PipelineResult, PipelineError> {
        let job_id = JobId::new();
        let tracker = StageTracker::default();
        let started = Instant::now();

        let span = tracing::info_span!("pipeline", job_id = %job_id);
        let outcome = tokio::select! {
            result = self.execute(&job_id, source_url, &tracker).instrument(span) => result,
            _ = cancelled(Some(cancel_rx)) => {
                let (source_id, stage) = tracker.snapshot(source_url);
                Err(PipelineError::Cancelled { source_id, stage })
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        match &outcome {
            Ok(result) => {
                metrics::record_job("success", elapsed);
                metrics::record_segments(result.succeeded_segment_count, result.skipped.len());
            }
            Err(e) => {
                metrics::record_job(e.kind(), elapsed);
                JobLogger::new(&job_id, e.source_id(), OPERATION).log_error(e.stage(), &e.to_string());
            }
        }
        outcome
    }

    async fn execute(
        &self,
        job_id: &JobId,
        source_url: &str,
        tracker: &StageTracker,
    ) -> Result<PipelineResult, PipelineError> {
        let video_id = validate_source_url(source_url)
            .into_result()
            .map_err(|reason| PipelineError::Validation {
                source_id: source_url.to_string(),
                stage: JobStage::Start,
                reason: ValidationReason::InvalidUrl(reason),
            })?;
        tracker.set_source(&video_id);

        let logger = JobLogger::new(job_id, &video_id, OPERATION);
        let span = logger.create_span();
        async move {
            logger.log_start(source_url);

            let _source = self
                .active
                .try_acquire(&video_id)
                .ok_or_else(|| PipelineError::SourceBusy {
                    source_id: video_id.clone(),
                    stage: JobStage::Start,
                })?;

            let metadata = self.resolve_metadata(&video_id, source_url).await?;
            tracker.enter(JobStage::MetadataResolved, &logger);
            logger.log_progress(&format!(
                "\"{}\" ({}s) by {}",
                metadata.title, metadata.duration_seconds, metadata.uploader
            ));

            self.check_duration(&video_id, &metadata)?;
            tracker.enter(JobStage::Validated, &logger);

            let content = TransientContent::create(&self.config.work_dir, job_id.as_str())
                .await
                .map_err(|cause| PipelineError::Io {
                    source_id: video_id.clone(),
                    stage: JobStage::Validated,
                    cause,
                })?;
            let retrieved = self
                .retriever
                .retrieve(source_url, &content.content_path(&video_id))
                .await
                .map_err(|cause| PipelineError::RetrievalFailed {
                    source_id: video_id.clone(),
                    stage: JobStage::Validated,
                    cause,
                })?;
            tracker.enter(JobStage::ContentRetrieved, &logger);
            logger.log_progress(&format!(
                "retrieved {:.2} MB using format {}",
                retrieved.size_mb(),
                retrieved.format
            ));

            tokio::fs::create_dir_all(&self.config.output_dir)
                .await
                .map_err(|cause| PipelineError::Io {
                    source_id: video_id.clone(),
                    stage: JobStage::ContentRetrieved,
                    cause,
                })?;

            let selection = self.selector.select(&metadata).await;
            tracker.enter(JobStage::SegmentsSelected, &logger);
            logger.log_progress(&format!(
                "{} segments from {}",
                selection.candidates.len(),
                selection.source.as_str()
            ));

            tracker.enter(JobStage::Rendering, &logger);
            let (clips, skipped) = self
                .render_all(&video_id, &retrieved.path, &selection.candidates, &logger)
                .await;

            content.release().await;
            tracker.enter(JobStage::Done, &logger);

            let total_output_bytes = clips.iter().map(|c| c.file_size_bytes).sum();
            let result = PipelineResult {
                job_id: job_id.clone(),
                source_url: source_url.to_string(),
                video_id: video_id.clone(),
                metadata,
                requested_segment_count: selection.candidates.len(),
                succeeded_segment_count: clips.len(),
                total_output_bytes,
                clips,
                skipped,
                selection_source: selection.source,
                processed_at: Utc::now(),
            };

            if result.all_segments_failed() {
                logger.log_warning("every segment failed to render");
            }
            logger.log_completion(&format!(
                "{}/{} clips, {:.2} MB",
                result.succeeded_segment_count,
                result.requested_segment_count,
                result.total_output_mb()
            ));
            Ok(result)
        }
        .instrument(span)
        .await
    }

    async fn resolve_metadata(
        &self,
        video_id: &str,
        source_url: &str,
    ) -> Result<VideoMetadata, PipelineError> {
        let timeout = self.config.metadata_timeout;
        let resolved = match tokio::time::timeout(timeout, self.resolver.resolve(source_url)).await {
            Ok(resolved) => resolved,
            Err(_) => Err(MediaError::Timeout(timeout.as_secs())),
        };
        resolved.map_err(|cause| PipelineError::MetadataUnavailable {
            source_id: video_id.to_string(),
            stage: JobStage::Start,
            cause,
        })
    }

    /// Duration gate, inclusive at both bounds.
    fn check_duration(&self, video_id: &str, metadata: &VideoMetadata) -> Result<(), PipelineError> {
        let duration_secs = metadata.duration_seconds;
        let reason = if duration_secs < self.config.min_duration_secs {
            ValidationReason::TooShort {
                duration_secs,
                min_secs: self.config.min_duration_secs,
            }
        } else if duration_secs > self.config.max_duration_secs {
            ValidationReason::TooLong {
                duration_secs,
                max_secs: self.config.max_duration_secs,
            }
        } else {
            return Ok(());
        };
        Err(PipelineError::Validation {
            source_id: video_id.to_string(),
            stage: JobStage::MetadataResolved,
            reason,
        })
    }

    /// Render every candidate, keeping selection order. A failed segment is
    /// recorded and skipped without affecting the others.
    async fn render_all(
        &self,
        video_id: &str,
        content: &Path,
        candidates: &[SegmentCandidate],
        logger: &JobLogger,
    ) -> (Vec<RenderedClip>, Vec<SkippedSegment>) {
        let total = candidates.len();
        let outcomes: Vec<_> = stream::iter(candidates.iter().enumerate())
            .map(|(index, segment)| {
                let output = self.config.output_dir.join(clip_file_name(video_id, index));
                async move {
                    logger.log_progress(&format!(
                        "rendering clip {}/{}: {}",
                        index + 1,
                        total,
                        segment.title
                    ));
                    (index, segment, self.renderer.render(content, segment, &output).await)
                }
            })
            .buffered(self.config.max_render_parallel.max(1))
            .collect()
            .await;

        let mut clips = Vec::with_capacity(total);
        let mut skipped = Vec::new();
        for (index, segment, outcome) in outcomes {
            match outcome {
                Ok(clip) => clips.push(clip),
                Err(e) => {
                    logger.log_warning(&format!("clip {} skipped: {}", index + 1, e));
                    skipped.push(SkippedSegment {
                        index,
                        title: segment.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        (clips, skipped)
    }
}
