//! In-process registry of sources with a running job.
//!
//! Two jobs for the same source would write the same output paths, so the
//! second one is refused while the first holds its [`SourceGuard`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Set of video IDs currently being processed.
#[derive(Debug, Clone, Default)]
pub struct ActiveSources {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ActiveSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `source_id`, or `None` if another job already holds it.
    pub fn try_acquire(&self, source_id: &str) -> Option<SourceGuard> {
        let mut active = self.lock();
        if !active.insert(source_id.to_string()) {
            return None;
        }
        debug!(source_id = %source_id, "Acquired source");
        Some(SourceGuard {
            sources: self.clone(),
            source_id: source_id.to_string(),
        })
    }

    pub fn is_active(&self, source_id: &str) -> bool {
        self.lock().contains(source_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The set stays consistent even if a holder panicked
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the source when dropped.
#[derive(Debug)]
pub struct SourceGuard {
    sources: ActiveSources,
    source_id: String,
}

impl SourceGuard {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.sources.lock().remove(&self.source_id);
        debug!(source_id = %self.source_id, "Released source");
    }
}
