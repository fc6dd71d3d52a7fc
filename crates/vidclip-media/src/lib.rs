//! yt-dlp and FFmpeg adapters for the VidClip pipeline.
//!
//! Each external step sits behind a small async trait so the orchestrator
//! can be exercised without the real tools:
//! - [`MetadataResolver`] describes a source without downloading it
//! - [`ContentRetriever`] downloads it through a format fallback chain
//! - [`ClipRenderer`] encodes one segment into one output file

pub mod command;
pub mod download;
pub mod error;
pub mod fallback;
pub mod metadata;
pub mod probe;
pub mod progress;
pub mod render;

pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::{retrieve_with_fallback, ContentRetriever, RetrievedContent, YtDlpRetriever, DEFAULT_FORMATS};
pub use error::{MediaError, MediaResult};
pub use fallback::{first_success, Exhausted};
pub use metadata::{MetadataResolver, YtDlpMetadataResolver};
pub use probe::probe_duration;
pub use progress::FfmpegProgress;
pub use render::{clamp_segment, fit_to_content, ClipRenderer, FfmpegClipRenderer};
