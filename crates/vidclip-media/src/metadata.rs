//! Metadata resolution via `yt-dlp -j`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use vidclip_models::{RawVideoInfo, VideoMetadata};

use crate::command::{check_ytdlp, last_stderr_line, run_tool};
use crate::error::{MediaError, MediaResult};

/// Describes a source without retrieving its content.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, source_url: &str) -> MediaResult<VideoMetadata>;
}

/// [`MetadataResolver`] backed by yt-dlp's JSON dump.
#[derive(Debug, Clone)]
pub struct YtDlpMetadataResolver {
    timeout: Duration,
}

impl YtDlpMetadataResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MetadataResolver for YtDlpMetadataResolver {
    async fn resolve(&self, source_url: &str) -> MediaResult<VideoMetadata> {
        check_ytdlp()?;

        let args = vec![
            "-j".to_string(),
            "--no-download".to_string(),
            "--no-playlist".to_string(),
            source_url.to_string(),
        ];
        let output = run_tool("yt-dlp", &args, self.timeout).await?;

        if !output.status.success() {
            return Err(MediaError::metadata_failed(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                last_stderr_line(&output)
            )));
        }

        let metadata = parse_metadata_json(&output.stdout)?;
        info!(
            source_url = %source_url,
            title = %metadata.title,
            duration_secs = metadata.duration_seconds,
            "Resolved video metadata"
        );
        Ok(metadata)
    }
}

/// Parse a yt-dlp JSON dump into [`VideoMetadata`].
pub fn parse_metadata_json(bytes: &[u8]) -> MediaResult<VideoMetadata> {
    let raw: RawVideoInfo = serde_json::from_slice(bytes)?;
    debug!(raw_duration = ?raw.duration, "Parsed raw metadata");
    VideoMetadata::from_raw(raw).map_err(|e| MediaError::metadata_failed(e.to_string()))
}
