//! Clip rendering with FFmpeg.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vidclip_models::{RenderProfile, RenderedClip, SegmentCandidate};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;

/// Default maximum rendered clip length in seconds.
pub const DEFAULT_MAX_CLIP_SECS: f64 = 30.0;

/// Renders one segment of local content into one standalone file.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    /// On success exactly one file exists at `output`; on failure none does.
    async fn render(
        &self,
        content: &Path,
        segment: &SegmentCandidate,
        output: &Path,
    ) -> MediaResult<RenderedClip>;
}

/// [`ClipRenderer`] applying a fixed [`RenderProfile`] through FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegClipRenderer {
    profile: RenderProfile,
    max_clip_secs: f64,
    timeout_secs: u64,
    /// Probed content durations, shared by every render of the same file
    durations: Arc<Mutex<HashMap<PathBuf, f64>>>,
}

impl FfmpegClipRenderer {
    pub fn new(profile: RenderProfile, max_clip_secs: f64, timeout_secs: u64) -> Self {
        Self {
            profile,
            max_clip_secs,
            timeout_secs,
            durations: Arc::default(),
        }
    }

    async fn content_duration(&self, content: &Path) -> MediaResult<f64> {
        let cached = self
            .durations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(content)
            .copied();
        if let Some(secs) = cached {
            return Ok(secs);
        }

        let secs = probe_duration(content).await?;
        self.durations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(content.to_path_buf(), secs);
        Ok(secs)
    }

    /// Clamp to the clip length limit, then to the actual content length.
    async fn prepare(&self, content: &Path, segment: &SegmentCandidate) -> MediaResult<SegmentCandidate> {
        let clamped = clamp_segment(segment, self.max_clip_secs)?;
        let content_secs = self.content_duration(content).await?;
        fit_to_content(&clamped, content_secs)
    }

    /// Build the FFmpeg command for an already-clamped segment.
    pub fn build_command(&self, content: &Path, segment: &SegmentCandidate, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(content, output)
            .seek(segment.start_seconds)
            .duration(segment.duration_secs())
            .video_filter(self.profile.video_filter())
            .output_args(self.profile.to_ffmpeg_args())
    }

    async fn run(&self, content: &Path, segment: &SegmentCandidate, output: &Path) -> MediaResult<u64> {
        if !content.exists() {
            return Err(MediaError::FileNotFound(content.to_path_buf()));
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cmd = self.build_command(content, segment, output);
        let runner = FfmpegRunner::new().with_timeout(self.timeout_secs);

        let total_secs = segment.duration_secs();
        let output_name = output.display().to_string();
        runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    output = %output_name,
                    percent = progress.percentage(total_secs),
                    speed = progress.speed,
                    "Render progress"
                );
            })
            .await?;

        let size = tokio::fs::metadata(output)
            .await
            .map_err(|_| MediaError::render_failed("FFmpeg produced no output file"))?
            .len();
        if size == 0 {
            return Err(MediaError::render_failed("FFmpeg produced an empty output file"));
        }
        Ok(size)
    }
}

impl Default for FfmpegClipRenderer {
    fn default() -> Self {
        Self::new(RenderProfile::default(), DEFAULT_MAX_CLIP_SECS, 300)
    }
}

#[async_trait]
impl ClipRenderer for FfmpegClipRenderer {
    async fn render(
        &self,
        content: &Path,
        segment: &SegmentCandidate,
        output: &Path,
    ) -> MediaResult<RenderedClip> {
        let rendered = match self.prepare(content, segment).await {
            Ok(clamped) => self
                .run(content, &clamped, output)
                .await
                .map(|file_size_bytes| (clamped, file_size_bytes)),
            Err(e) => Err(e),
        };

        match rendered {
            Ok((clamped, file_size_bytes)) => {
                let clip = RenderedClip {
                    rendered_duration_seconds: clamped.duration_secs(),
                    segment: clamped,
                    file_path: output.to_path_buf(),
                    file_size_bytes,
                    format: self.profile.descriptor(),
                };
                info!(
                    output = %output.display(),
                    size_mb = clip.size_mb(),
                    duration_secs = clip.rendered_duration_seconds,
                    "Rendered clip"
                );
                Ok(clip)
            }
            Err(e) => {
                remove_partial_output(output).await;
                match e {
                    MediaError::RenderFailed { .. } => Err(e),
                    other => Err(MediaError::render_failed(other.to_string())),
                }
            }
        }
    }
}

/// Reject impossible ranges and cap the span at `max_clip_secs`.
///
/// The end is only ever moved earlier.
pub fn clamp_segment(segment: &SegmentCandidate, max_clip_secs: f64) -> MediaResult<SegmentCandidate> {
    let valid = segment.start_seconds.is_finite()
        && segment.end_seconds.is_finite()
        && segment.start_seconds >= 0.0
        && segment.end_seconds > segment.start_seconds;
    if !valid {
        return Err(MediaError::SegmentOutOfBounds {
            start: segment.start_seconds,
            end: segment.end_seconds,
        });
    }
    Ok(segment.limited_to(max_clip_secs))
}

/// Fit a segment into content that is `content_secs` long.
///
/// A segment starting at or past the end of the content is rejected; one
/// that runs past the end is cut back to it.
pub fn fit_to_content(segment: &SegmentCandidate, content_secs: f64) -> MediaResult<SegmentCandidate> {
    let out_of_bounds = || MediaError::SegmentOutOfBounds {
        start: segment.start_seconds,
        end: segment.end_seconds,
    };
    if !content_secs.is_finite() || segment.start_seconds >= content_secs {
        return Err(out_of_bounds());
    }
    segment
        .clone()
        .clamp_to_duration(content_secs)
        .map_err(|_| out_of_bounds())
}

/// Remove a partially written output so a failed render leaves nothing behind.
pub async fn remove_partial_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!(output = %output.display(), "Removed partial render output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(output = %output.display(), error = %e, "Failed to remove partial render output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clamp_segment_caps_long_spans() {
        let seg = SegmentCandidate::new(10.0, 95.0, "Long", "", 0.9);
        let clamped = clamp_segment(&seg, 30.0).unwrap();
        assert_eq!(clamped.start_seconds, 10.0);
        assert_eq!(clamped.end_seconds, 40.0);
        assert!(clamped.duration_secs() <= 30.0);
    }

    #[test]
    fn test_clamp_segment_rejects_out_of_bounds() {
        let backwards = SegmentCandidate {
            start_seconds: 20.0,
            end_seconds: 5.0,
            title: "x".to_string(),
            description: String::new(),
            viral_score: 0.5,
        };
        assert!(matches!(
            clamp_segment(&backwards, 30.0),
            Err(MediaError::SegmentOutOfBounds { .. })
        ));

        let negative = SegmentCandidate {
            start_seconds: -1.0,
            ..backwards
        };
        assert!(clamp_segment(&negative, 30.0).is_err());
    }

    #[test]
    fn test_fit_to_content_caps_end_at_content_length() {
        let seg = SegmentCandidate::new(110.0, 125.0, "Finale", "", 0.7);
        let fitted = fit_to_content(&seg, 120.0).unwrap();
        assert_eq!(fitted.start_seconds, 110.0);
        assert_eq!(fitted.end_seconds, 120.0);

        let inside = SegmentCandidate::new(3.0, 18.0, "Hook", "", 0.8);
        assert_eq!(fit_to_content(&inside, 120.0).unwrap(), inside);
    }

    #[test]
    fn test_fit_to_content_rejects_segments_past_the_end() {
        let past_end = SegmentCandidate::new(200.0, 215.0, "Late", "", 0.5);
        assert!(matches!(
            fit_to_content(&past_end, 120.0),
            Err(MediaError::SegmentOutOfBounds { start, .. }) if start == 200.0
        ));

        let at_end = SegmentCandidate::new(120.0, 135.0, "Edge", "", 0.5);
        assert!(fit_to_content(&at_end, 120.0).is_err());

        // Zero-length content admits no segment
        let any = SegmentCandidate::new(0.0, 15.0, "Highlight", "", 0.6);
        assert!(fit_to_content(&any, 0.0).is_err());
        assert!(fit_to_content(&any, f64::NAN).is_err());
    }

    #[test]
    fn test_build_command_uses_profile() {
        let renderer = FfmpegClipRenderer::default();
        let seg = SegmentCandidate::new(3.0, 18.0, "Hook", "", 0.8);
        let args = renderer
            .build_command(Path::new("in.mp4"), &seg, Path::new("out/abc_clip1.mp4"))
            .build_args()
            .join(" ");

        assert!(args.contains("-ss 3.000 -t 15.000 -i in.mp4"));
        assert!(args.contains("-vf scale=720:1280:force_original_aspect_ratio=decrease"));
        assert!(args.contains("-preset veryfast -crf 28"));
        assert!(args.contains("-movflags +faststart out/abc_clip1.mp4"));
    }

    #[tokio::test]
    async fn test_missing_content_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clip.mp4");
        tokio::fs::write(&output, b"stale").await.unwrap();

        let seg = SegmentCandidate::new(0.0, 10.0, "t", "", 0.5);
        let err = FfmpegClipRenderer::default()
            .render(&dir.path().join("missing.mp4"), &seg, &output)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::RenderFailed { .. }));
        assert!(!output.exists());
    }
}
