//! Scoped ownership of a job's transient local content.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Per-job work directory that is removed on every exit path.
///
/// [`TransientContent::release`] removes it asynchronously on normal paths.
/// If the guard is dropped without being released (an error returned
/// early, a panic, or the job future dropped on cancellation), `Drop`
/// removes it synchronously.
#[derive(Debug)]
pub struct TransientContent {
    dir: PathBuf,
    released: bool,
}

impl TransientContent {
    /// Create `work_dir/<job_id>/`.
    pub async fn create(work_dir: &Path, job_id: &str) -> std::io::Result<Self> {
        let dir = work_dir.join(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Created job work directory");
        Ok(Self { dir, released: false })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for the retrieved media of `video_id`.
    pub fn content_path(&self, video_id: &str) -> PathBuf {
        self.dir.join(format!("{}.mp4", video_id))
    }

    /// Remove the work directory and everything in it.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = %self.dir.display(), "Removed job work directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                // Fall back to the synchronous path in Drop
                warn!(dir = %self.dir.display(), error = %e, "Async cleanup failed, retrying");
                self.released = false;
            }
        }
    }
}

impl Drop for TransientContent {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(dir = %self.dir.display(), "Removed job work directory on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "Failed to remove job work directory"),
        }
    }
}
