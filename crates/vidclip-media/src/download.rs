//! Content retrieval using yt-dlp with a descending-quality format chain.
//!
//! Hosts frequently refuse particular format requests depending on region or
//! licensing, so each format is tried in order until one produces a local
//! file that passes size verification.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::{check_ytdlp, last_stderr_line, run_tool};
use crate::error::{MediaError, MediaResult};
use crate::fallback::first_success;

/// Default format chain, highest preference first.
pub const DEFAULT_FORMATS: &[&str] = &[
    "best[height<=720][ext=mp4]",
    "best[height<=480][ext=mp4]",
    "best[ext=mp4]",
    "best[height<=720]",
    "best",
];

/// Files at or below this size are treated as failed downloads.
pub const DEFAULT_MIN_CONTENT_BYTES: u64 = 1024;

/// A verified local copy of the source content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContent {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Format request that succeeded
    pub format: String,
}

impl RetrievedContent {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Materializes source content at a local path.
#[async_trait]
pub trait ContentRetriever: Send + Sync {
    async fn retrieve(&self, source_url: &str, destination: &Path) -> MediaResult<RetrievedContent>;
}

/// [`ContentRetriever`] that shells out to yt-dlp once per format candidate.
#[derive(Debug, Clone)]
pub struct YtDlpRetriever {
    formats: Vec<String>,
    attempt_timeout: Duration,
    min_content_bytes: u64,
}

impl YtDlpRetriever {
    pub fn new(formats: Vec<String>, attempt_timeout: Duration, min_content_bytes: u64) -> Self {
        Self {
            formats,
            attempt_timeout,
            min_content_bytes,
        }
    }
}

impl Default for YtDlpRetriever {
    fn default() -> Self {
        Self::new(
            DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
            Duration::from_secs(120),
            DEFAULT_MIN_CONTENT_BYTES,
        )
    }
}

#[async_trait]
impl ContentRetriever for YtDlpRetriever {
    async fn retrieve(&self, source_url: &str, destination: &Path) -> MediaResult<RetrievedContent> {
        check_ytdlp()?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let timeout = self.attempt_timeout;
        retrieve_with_fallback(&self.formats, destination, self.min_content_bytes, |format| {
            let args = vec![
                "-f".to_string(),
                format,
                "--no-playlist".to_string(),
                "-o".to_string(),
                destination.to_string_lossy().to_string(),
                source_url.to_string(),
            ];
            async move {
                let output = run_tool("yt-dlp", &args, timeout).await?;
                if output.status.success() {
                    Ok(())
                } else {
                    Err(MediaError::download_failed(format!(
                        "yt-dlp failed: {}",
                        last_stderr_line(&output)
                    )))
                }
            }
        })
        .await
    }
}

/// Run the format chain against `destination`.
///
/// `attempt` performs one download for the given format. Each attempt is
/// followed by size verification; any failure discards partial artifacts
/// before the next format is tried. When every format fails, the last
/// error is surfaced as the cause of [`MediaError::RetrievalExhausted`].
pub async fn retrieve_with_fallback<F, Fut>(
    formats: &[String],
    destination: &Path,
    min_content_bytes: u64,
    mut attempt: F,
) -> MediaResult<RetrievedContent>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = MediaResult<()>>,
{
    let outcome = first_success(
        formats,
        |index, format| {
            info!(
                format = %format,
                attempt = index + 1,
                total = formats.len(),
                "Attempting download"
            );
            let download = attempt(format.clone());
            async move {
                let verified = match download.await {
                    Ok(()) => verify_content(destination, min_content_bytes).await,
                    Err(e) => Err(e),
                };
                if verified.is_err() {
                    discard_partial(destination).await;
                }
                verified
            }
        },
        |index, format, e| {
            warn!(format = %format, attempt = index + 1, error = %e, "Download attempt failed");
        },
    )
    .await;

    match outcome {
        Ok((index, size_bytes)) => {
            let content = RetrievedContent {
                path: destination.to_path_buf(),
                size_bytes,
                format: formats[index].clone(),
            };
            info!(
                format = %content.format,
                size_mb = content.size_mb(),
                "Downloaded source content"
            );
            Ok(content)
        }
        Err(exhausted) => match exhausted.last {
            Some(last) => Err(MediaError::RetrievalExhausted {
                attempts: exhausted.attempts,
                last: Box::new(last),
            }),
            None => Err(MediaError::download_failed("no format candidates configured")),
        },
    }
}

/// Confirm the artifact exists and exceeds the minimum size.
async fn verify_content(path: &Path, min_bytes: u64) -> MediaResult<u64> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    if meta.len() <= min_bytes {
        return Err(MediaError::ContentTooSmall {
            size_bytes: meta.len(),
            min_bytes,
        });
    }
    Ok(meta.len())
}

/// Remove the artifact and yt-dlp's `.part` sibling if present.
async fn discard_partial(path: &Path) {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    for candidate in [path.to_path_buf(), PathBuf::from(part)] {
        if let Err(e) = tokio::fs::remove_file(&candidate).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %candidate.display(), error = %e, "Failed to discard partial download");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn formats(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("fmt{}", i)).collect()
    }

    #[tokio::test]
    async fn test_third_candidate_wins_and_fourth_never_tried() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("video.mp4");
        let tried = Arc::new(Mutex::new(Vec::new()));

        let content = retrieve_with_fallback(&formats(5), &dest, 1024, |format| {
            tried.lock().unwrap().push(format.clone());
            let dest = dest.clone();
            async move {
                match format.as_str() {
                    "fmt3" => tokio::fs::write(&dest, vec![0u8; 4096])
                        .await
                        .map_err(MediaError::from),
                    _ => Err(MediaError::download_failed("format rejected")),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(content.format, "fmt3");
        assert_eq!(content.size_bytes, 4096);
        assert_eq!(*tried.lock().unwrap(), vec!["fmt1", "fmt2", "fmt3"]);
    }

    #[tokio::test]
    async fn test_undersized_artifact_is_discarded_and_chain_advances() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("video.mp4");

        let content = retrieve_with_fallback(&formats(2), &dest, 1024, |format| {
            let dest = dest.clone();
            async move {
                // First format "succeeds" but writes a stub
                let size = if format == "fmt1" { 10 } else { 2048 };
                tokio::fs::write(&dest, vec![0u8; size])
                    .await
                    .map_err(MediaError::from)
            }
        })
        .await
        .unwrap();

        assert_eq!(content.format, "fmt2");
        assert_eq!(content.size_bytes, 2048);
    }

    #[tokio::test]
    async fn test_all_candidates_fail_surfaces_last_error() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("video.mp4");

        let err = retrieve_with_fallback(&formats(3), &dest, 1024, |format| {
            let dest = dest.clone();
            async move {
                let _ = tokio::fs::write(dest.with_extension("mp4.part"), b"partial").await;
                if format == "fmt3" {
                    Err(MediaError::Timeout(120))
                } else {
                    Err(MediaError::download_failed("rejected"))
                }
            }
        })
        .await
        .unwrap_err();

        match err {
            MediaError::RetrievalExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.is_timeout());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dest.exists());
        assert!(!dest.with_extension("mp4.part").exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("video.mp4");

        let err = retrieve_with_fallback(&formats(1), &dest, 1024, |_| async {
            Ok::<(), MediaError>(())
        })
            .await
            .unwrap_err();

        match err {
            MediaError::RetrievalExhausted { last, .. } => {
                assert!(matches!(*last, MediaError::FileNotFound(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
