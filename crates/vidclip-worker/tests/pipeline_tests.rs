//! End-to-end pipeline tests with in-process fakes for yt-dlp, FFmpeg and
//! the scoring service.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{watch, Notify};

use vidclip_media::{
    clamp_segment, ClipRenderer, ContentRetriever, MediaError, MediaResult, MetadataResolver,
    RetrievedContent,
};
use vidclip_models::{
    JobStage, RenderProfile, RenderedClip, SegmentCandidate, SelectionSource, VideoMetadata,
};
use vidclip_worker::{
    HeuristicConfig, PipelineConfig, PipelineError, PipelineOrchestrator, ScoringConfig,
    ScoringRequest, SegmentScorer, SegmentSelector, ValidationReason, WorkerError, WorkerResult,
};

const URL: &str = "https://www.youtube.com/watch?v=jNQXAC9IVRw";
const VIDEO_ID: &str = "jNQXAC9IVRw";

fn metadata(duration_seconds: u64) -> VideoMetadata {
    VideoMetadata {
        title: "Me at the zoo".to_string(),
        duration_seconds,
        description: "The first video on YouTube".to_string(),
        uploader: "jawed".to_string(),
        view_count: 300_000_000,
        upload_date: Some("20050423".to_string()),
    }
}

struct FakeResolver {
    metadata: Result<VideoMetadata, String>,
    calls: AtomicUsize,
}

impl FakeResolver {
    fn with_duration(duration_seconds: u64) -> Self {
        Self {
            metadata: Ok(metadata(duration_seconds)),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            metadata: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MetadataResolver for FakeResolver {
    async fn resolve(&self, _source_url: &str) -> MediaResult<VideoMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.metadata.clone().map_err(MediaError::metadata_failed)
    }
}

struct HangingResolver;

#[async_trait]
impl MetadataResolver for HangingResolver {
    async fn resolve(&self, _source_url: &str) -> MediaResult<VideoMetadata> {
        std::future::pending().await
    }
}

/// Writes a small file at the destination and remembers where.
#[derive(Default)]
struct SpyRetriever {
    calls: AtomicUsize,
    last_path: Mutex<Option<PathBuf>>,
    fail: bool,
}

impl SpyRetriever {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn last_path(&self) -> Option<PathBuf> {
        self.last_path.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentRetriever for SpyRetriever {
    async fn retrieve(&self, _source_url: &str, destination: &Path) -> MediaResult<RetrievedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(destination.to_path_buf());
        tokio::fs::write(destination, vec![0u8; 4096]).await?;
        if self.fail {
            return Err(MediaError::download_failed("HTTP Error 403: Forbidden"));
        }
        Ok(RetrievedContent {
            path: destination.to_path_buf(),
            size_bytes: 4096,
            format: "best[height<=720]".to_string(),
        })
    }
}

/// Writes the content, signals, then never finishes.
#[derive(Default)]
struct HangingRetriever {
    started: Arc<Notify>,
    last_path: Mutex<Option<PathBuf>>,
}

#[async_trait]
impl ContentRetriever for HangingRetriever {
    async fn retrieve(&self, _source_url: &str, destination: &Path) -> MediaResult<RetrievedContent> {
        tokio::fs::write(destination, vec![0u8; 4096]).await?;
        *self.last_path.lock().unwrap() = Some(destination.to_path_buf());
        self.started.notify_one();
        std::future::pending().await
    }
}

/// Fails any segment whose title contains "broken".
struct ScriptedRenderer {
    max_clip_secs: f64,
}

#[async_trait]
impl ClipRenderer for ScriptedRenderer {
    async fn render(
        &self,
        _content: &Path,
        segment: &SegmentCandidate,
        output: &Path,
    ) -> MediaResult<RenderedClip> {
        if segment.title.contains("broken") {
            return Err(MediaError::render_failed("encoder exited with status 1"));
        }
        let rendered = clamp_segment(segment, self.max_clip_secs)?;
        tokio::fs::write(output, b"clip").await?;
        Ok(RenderedClip {
            rendered_duration_seconds: rendered.duration_secs(),
            segment: rendered,
            file_path: output.to_path_buf(),
            file_size_bytes: 4,
            format: RenderProfile::default().descriptor(),
        })
    }
}

/// Finishes segments out of order: anything titled "Hook" renders slowly.
#[derive(Default)]
struct StaggeredRenderer {
    finished: Mutex<Vec<String>>,
}

impl StaggeredRenderer {
    fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClipRenderer for StaggeredRenderer {
    async fn render(
        &self,
        _content: &Path,
        segment: &SegmentCandidate,
        output: &Path,
    ) -> MediaResult<RenderedClip> {
        if segment.title.starts_with("Hook") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        tokio::fs::write(output, b"clip").await?;
        self.finished.lock().unwrap().push(segment.title.clone());
        Ok(RenderedClip {
            rendered_duration_seconds: segment.duration_secs(),
            segment: segment.clone(),
            file_path: output.to_path_buf(),
            file_size_bytes: 4,
            format: RenderProfile::default().descriptor(),
        })
    }
}

enum ScorerReply {
    Text(String),
    Error,
}

struct FakeScorer {
    reply: ScorerReply,
}

impl FakeScorer {
    fn text(reply: &str) -> Arc<dyn SegmentScorer> {
        Arc::new(Self {
            reply: ScorerReply::Text(reply.to_string()),
        })
    }

    fn error() -> Arc<dyn SegmentScorer> {
        Arc::new(Self {
            reply: ScorerReply::Error,
        })
    }
}

#[async_trait]
impl SegmentScorer for FakeScorer {
    async fn score(&self, _request: &ScoringRequest) -> WorkerResult<String> {
        match &self.reply {
            ScorerReply::Text(text) => Ok(text.clone()),
            ScorerReply::Error => Err(WorkerError::scoring_failed("scoring API returned 503")),
        }
    }
}

struct Harness {
    orchestrator: PipelineOrchestrator,
    resolver: Arc<FakeResolver>,
    retriever: Arc<SpyRetriever>,
    work: TempDir,
    output: TempDir,
}

impl Harness {
    fn new(resolver: FakeResolver, retriever: SpyRetriever, scorer: Option<Arc<dyn SegmentScorer>>) -> Self {
        let work = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = config(work.path(), output.path());

        let resolver = Arc::new(resolver);
        let retriever = Arc::new(retriever);
        let selector = SegmentSelector::new(scorer, ScoringConfig::default(), HeuristicConfig::default());
        let orchestrator = PipelineOrchestrator::new(
            config,
            resolver.clone(),
            retriever.clone(),
            selector,
            Arc::new(ScriptedRenderer { max_clip_secs: 30.0 }),
        );

        Self {
            orchestrator,
            resolver,
            retriever,
            work,
            output,
        }
    }

    fn with_duration(duration_seconds: u64) -> Self {
        Self::new(FakeResolver::with_duration(duration_seconds), SpyRetriever::default(), None)
    }

    fn work_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.work.path()).unwrap().next().is_none()
    }
}

fn config(work: &Path, output: &Path) -> PipelineConfig {
    PipelineConfig {
        work_dir: work.to_path_buf(),
        output_dir: output.join("clips"),
        ..Default::default()
    }
}

fn scored_reply(clips: &[(f64, f64, &str)]) -> String {
    let clips: Vec<_> = clips
        .iter()
        .map(|(start, end, title)| {
            serde_json::json!({
                "start_time": start,
                "end_time": end,
                "title": title,
                "description": "scored",
                "viral_score": 0.9
            })
        })
        .collect();
    serde_json::json!({ "clips": clips }).to_string()
}

#[tokio::test]
async fn test_too_short_video_is_rejected_before_retrieval() {
    let h = Harness::with_duration(5);

    let err = h.orchestrator.run(URL).await.unwrap_err();
    match &err {
        PipelineError::Validation { reason, stage, .. } => {
            assert_eq!(
                *reason,
                ValidationReason::TooShort {
                    duration_secs: 5,
                    min_secs: 10
                }
            );
            assert_eq!(*stage, JobStage::MetadataResolved);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(err.is_client_error());
    assert_eq!(h.retriever.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_too_long_video_is_rejected_before_retrieval() {
    let h = Harness::with_duration(601);

    let err = h.orchestrator.run(URL).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation {
            reason: ValidationReason::TooLong { duration_secs: 601, max_secs: 600 },
            ..
        }
    ));
    assert_eq!(h.retriever.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_duration_bounds_are_inclusive() {
    for duration in [10, 600] {
        let h = Harness::with_duration(duration);
        let result = h.orchestrator.run(URL).await.unwrap();
        assert!(result.requested_segment_count >= 1, "duration {}", duration);
    }
}

#[tokio::test]
async fn test_invalid_url_is_rejected_before_metadata() {
    let h = Harness::with_duration(120);

    let err = h.orchestrator.run("https://vimeo.com/12345").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation {
            reason: ValidationReason::InvalidUrl(_),
            stage: JobStage::Start,
            ..
        }
    ));
    assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_metadata_failure_is_job_fatal() {
    let h = Harness::new(FakeResolver::failing("Video unavailable"), SpyRetriever::default(), None);

    let err = h.orchestrator.run(URL).await.unwrap_err();
    assert!(matches!(err, PipelineError::MetadataUnavailable { stage: JobStage::Start, .. }));
    assert!(err.is_retryable());
    assert_eq!(err.source_id(), VIDEO_ID);
    assert_eq!(h.retriever.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_metadata_lookup_is_bounded() {
    let work = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let config = PipelineConfig {
        metadata_timeout: Duration::from_millis(50),
        ..config(work.path(), output.path())
    };
    let orchestrator = PipelineOrchestrator::new(
        config,
        Arc::new(HangingResolver),
        Arc::new(SpyRetriever::default()),
        SegmentSelector::heuristic_only(HeuristicConfig::default()),
        Arc::new(ScriptedRenderer { max_clip_secs: 30.0 }),
    );

    let err = orchestrator.run(URL).await.unwrap_err();
    match err {
        PipelineError::MetadataUnavailable { cause, .. } => assert!(cause.is_timeout()),
        other => panic!("expected metadata timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_segment_does_not_affect_others() {
    let reply = scored_reply(&[(0.0, 15.0, "Opening"), (20.0, 35.0, "broken take"), (40.0, 55.0, "Closing")]);
    let h = Harness::new(
        FakeResolver::with_duration(120),
        SpyRetriever::default(),
        Some(FakeScorer::text(&reply)),
    );

    let result = h.orchestrator.run(URL).await.unwrap();

    assert_eq!(result.selection_source, SelectionSource::External);
    assert_eq!(result.requested_segment_count, 3);
    assert_eq!(result.succeeded_segment_count, 2);
    assert_eq!(result.clips[0].segment.title, "Opening");
    assert_eq!(result.clips[1].segment.title, "Closing");
    assert_eq!(result.clips[0].file_name(), Some("jNQXAC9IVRw_clip1.mp4"));
    assert_eq!(result.clips[1].file_name(), Some("jNQXAC9IVRw_clip3.mp4"));
    assert_eq!(result.total_output_bytes, 8);

    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].index, 1);
    assert_eq!(result.skipped[0].title, "broken take");
    assert!(!h.output.path().join("clips/jNQXAC9IVRw_clip2.mp4").exists());
    assert!(!result.all_segments_failed());
}

#[tokio::test]
async fn test_rendered_clips_respect_max_length() {
    let reply = scored_reply(&[(10.0, 100.0, "Long stretch")]);
    let h = Harness::new(
        FakeResolver::with_duration(120),
        SpyRetriever::default(),
        Some(FakeScorer::text(&reply)),
    );

    let result = h.orchestrator.run(URL).await.unwrap();
    let clip = &result.clips[0];
    assert_eq!(clip.segment.start_seconds, 10.0);
    assert_eq!(clip.segment.end_seconds, 40.0);
    assert!(clip.rendered_duration_seconds <= 30.0);
}

#[tokio::test]
async fn test_transient_content_removed_after_success() {
    let h = Harness::with_duration(120);

    let result = h.orchestrator.run(URL).await.unwrap();
    assert!(result.succeeded_segment_count > 0);

    let content = h.retriever.last_path().unwrap();
    assert!(!content.exists());
    assert!(h.work_dir_is_empty());
    assert!(h.orchestrator.active_sources().is_empty());
}

#[tokio::test]
async fn test_transient_content_removed_after_retrieval_failure() {
    let h = Harness::new(FakeResolver::with_duration(120), SpyRetriever::failing(), None);

    let err = h.orchestrator.run(URL).await.unwrap_err();
    assert!(matches!(err, PipelineError::RetrievalFailed { stage: JobStage::Validated, .. }));

    let content = h.retriever.last_path().unwrap();
    assert!(!content.exists());
    assert!(h.work_dir_is_empty());
    assert!(h.orchestrator.active_sources().is_empty());
}

#[tokio::test]
async fn test_all_segments_failing_is_not_a_job_failure() {
    let reply = scored_reply(&[(0.0, 15.0, "broken one"), (20.0, 35.0, "broken two")]);
    let h = Harness::new(
        FakeResolver::with_duration(120),
        SpyRetriever::default(),
        Some(FakeScorer::text(&reply)),
    );

    let result = h.orchestrator.run(URL).await.unwrap();
    assert!(result.clips.is_empty());
    assert_eq!(result.skipped.len(), 2);
    assert!(result.all_segments_failed());
    assert_eq!(result.total_output_bytes, 0);
    assert!(h.work_dir_is_empty());
}

#[tokio::test]
async fn test_concurrent_job_for_same_source_is_refused() {
    let h = Harness::with_duration(120);
    let _running = h.orchestrator.active_sources().try_acquire(VIDEO_ID).unwrap();

    let err = h.orchestrator.run(URL).await.unwrap_err();
    assert!(matches!(err, PipelineError::SourceBusy { .. }));
    assert!(err.is_client_error());
    assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);

    // The existing holder keeps the source
    assert!(h.orchestrator.active_sources().is_active(VIDEO_ID));
}

#[tokio::test]
async fn test_cancellation_during_retrieval_cleans_up() {
    let work = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let retriever = Arc::new(HangingRetriever::default());
    let orchestrator = PipelineOrchestrator::new(
        config(work.path(), output.path()),
        Arc::new(FakeResolver::with_duration(120)),
        retriever.clone(),
        SegmentSelector::heuristic_only(HeuristicConfig::default()),
        Arc::new(ScriptedRenderer { max_clip_secs: 30.0 }),
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let started = retriever.started.clone();
    let (outcome, _) = tokio::join!(orchestrator.run_with_cancel(URL, cancel_rx), async move {
        started.notified().await;
        cancel_tx.send(true).unwrap();
    });

    match outcome {
        Err(PipelineError::Cancelled { source_id, stage }) => {
            assert_eq!(source_id, VIDEO_ID);
            assert_eq!(stage, JobStage::Validated);
        }
        other => panic!("expected cancellation, got {:?}", other),
    }

    let content = retriever.last_path.lock().unwrap().clone().unwrap();
    assert!(!content.exists());
    assert!(std::fs::read_dir(work.path()).unwrap().next().is_none());
    assert!(orchestrator.active_sources().is_empty());
}

#[tokio::test]
async fn test_malformed_scoring_reply_falls_back_to_heuristic() {
    let h = Harness::new(
        FakeResolver::with_duration(120),
        SpyRetriever::default(),
        Some(FakeScorer::text("Sure! Here are some great moments.")),
    );

    let result = h.orchestrator.run(URL).await.unwrap();
    assert_eq!(result.selection_source, SelectionSource::Heuristic);
    assert!(result.succeeded_segment_count >= 1);
}

#[tokio::test]
async fn test_scoring_error_falls_back_to_heuristic() {
    let h = Harness::new(
        FakeResolver::with_duration(120),
        SpyRetriever::default(),
        Some(FakeScorer::error()),
    );

    let result = h.orchestrator.run(URL).await.unwrap();
    assert_eq!(result.selection_source, SelectionSource::Heuristic);
}

#[tokio::test]
async fn test_short_video_gets_single_hook_clip() {
    let h = Harness::with_duration(19);

    let result = h.orchestrator.run(URL).await.unwrap();
    assert_eq!(result.selection_source, SelectionSource::Heuristic);
    assert_eq!(result.clips.len(), 1);
    assert_eq!(result.clips[0].segment.start_seconds, 3.0);
    assert_eq!(result.clips[0].segment.end_seconds, 18.0);
    assert_eq!(result.video_id, VIDEO_ID);
    assert_eq!(result.metadata.title, "Me at the zoo");
}

#[tokio::test]
async fn test_parallel_renders_keep_selection_order() {
    let work = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let renderer = Arc::new(StaggeredRenderer::default());
    let orchestrator = PipelineOrchestrator::new(
        PipelineConfig {
            max_render_parallel: 3,
            ..config(work.path(), output.path())
        },
        Arc::new(FakeResolver::with_duration(120)),
        Arc::new(SpyRetriever::default()),
        SegmentSelector::new(None, ScoringConfig::default(), HeuristicConfig::default()),
        renderer.clone(),
    );

    let result = orchestrator.run(URL).await.unwrap();

    // The hook started first but finished last
    let finished = renderer.finished();
    assert_eq!(finished.len(), 3);
    assert!(finished[2].starts_with("Hook"), "finished in {:?}", finished);

    let titles: Vec<&str> = result.clips.iter().map(|c| c.segment.title.as_str()).collect();
    assert_eq!(titles.len(), 3);
    assert!(titles[0].starts_with("Hook - "));
    assert!(titles[1].starts_with("Key moment - "));
    assert!(titles[2].starts_with("Finale - "));
    assert_eq!(result.succeeded_segment_count, 3);
}
