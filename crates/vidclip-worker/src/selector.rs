//! Segment selection: external scoring with a deterministic heuristic fallback.
//!
//! [`SegmentSelector::select`] never fails. Any problem with the scoring
//! call or its reply is a [`SelectorFailure`], logged and answered with
//! [`heuristic_segments`].

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use vidclip_models::video::truncate_chars;
use vidclip_models::{RawSegment, SegmentCandidate, SegmentRejection, SelectionSource, VideoMetadata};

use crate::config::{HeuristicConfig, ScoringConfig};
use crate::error::WorkerError;
use crate::metrics;
use crate::scoring::{ScoringRequest, SegmentScorer};

/// Characters of the video title used in heuristic segment titles.
const TITLE_PREFIX_CHARS: usize = 25;

/// Why external scoring could not be used. Never leaves the selector.
#[derive(Debug, Error)]
pub enum SelectorFailure {
    #[error("scoring service not configured")]
    NotConfigured,

    #[error("scoring call failed: {0}")]
    Call(#[source] WorkerError),

    #[error("scoring call timed out after {0}s")]
    TimedOut(u64),

    #[error("reply is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("reply has no clips array")]
    MissingClips,

    #[error("reply contains no clips")]
    Empty,

    #[error("clip {index} rejected: {reason}")]
    InvalidSegment {
        index: usize,
        #[source]
        reason: SegmentRejection,
    },
}

impl SelectorFailure {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SelectorFailure::NotConfigured => "not_configured",
            SelectorFailure::Call(_) => "call_failed",
            SelectorFailure::TimedOut(_) => "timeout",
            SelectorFailure::Parse(_) => "parse",
            SelectorFailure::MissingClips => "missing_clips",
            SelectorFailure::Empty => "empty",
            SelectorFailure::InvalidSegment { .. } => "invalid_segment",
        }
    }
}

/// Ordered segment candidates and where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub candidates: Vec<SegmentCandidate>,
    pub source: SelectionSource,
}

#[derive(Debug, Deserialize)]
struct ScoringReply {
    clips: Option<Vec<RawSegment>>,
}

/// Chooses the segments to render for one video.
pub struct SegmentSelector {
    scorer: Option<Arc<dyn SegmentScorer>>,
    scoring: ScoringConfig,
    heuristic: HeuristicConfig,
}

impl SegmentSelector {
    pub fn new(
        scorer: Option<Arc<dyn SegmentScorer>>,
        scoring: ScoringConfig,
        heuristic: HeuristicConfig,
    ) -> Self {
        Self {
            scorer,
            scoring,
            heuristic,
        }
    }

    /// Selector that always uses the heuristic.
    pub fn heuristic_only(heuristic: HeuristicConfig) -> Self {
        Self::new(None, ScoringConfig::default(), heuristic)
    }

    /// Select segments for `metadata`. Always returns at least one candidate.
    pub async fn select(&self, metadata: &VideoMetadata) -> Selection {
        match self.select_external(metadata).await {
            Ok(candidates) => {
                info!(count = candidates.len(), "Using externally scored segments");
                Selection {
                    candidates,
                    source: SelectionSource::External,
                }
            }
            Err(failure) => {
                match &failure {
                    SelectorFailure::NotConfigured => {
                        info!("Scoring service not configured, using heuristic segments")
                    }
                    other => warn!(error = %other, "Segment scoring failed, using heuristic segments"),
                }
                metrics::record_selector_fallback(failure.kind());
                Selection {
                    candidates: heuristic_segments(metadata, &self.heuristic),
                    source: SelectionSource::Heuristic,
                }
            }
        }
    }

    async fn select_external(&self, metadata: &VideoMetadata) -> Result<Vec<SegmentCandidate>, SelectorFailure> {
        let scorer = self.scorer.as_ref().ok_or(SelectorFailure::NotConfigured)?;
        let request = ScoringRequest::new(metadata, &self.scoring);

        // Bounded here as well so any scorer implementation is covered
        let reply = tokio::time::timeout(self.scoring.timeout, scorer.score(&request))
            .await
            .map_err(|_| SelectorFailure::TimedOut(self.scoring.timeout.as_secs()))?
            .map_err(SelectorFailure::Call)?;

        parse_scored_segments(&reply, metadata.duration_secs_f64(), self.scoring.segment_count)
    }
}

/// Parse and validate a scoring reply.
///
/// Any segment violating the candidate invariants rejects the whole reply.
/// At most `max_segments` candidates are kept, in reply order.
pub fn parse_scored_segments(
    reply: &str,
    duration_secs: f64,
    max_segments: usize,
) -> Result<Vec<SegmentCandidate>, SelectorFailure> {
    let parsed: ScoringReply =
        serde_json::from_str(extract_json(reply)).map_err(SelectorFailure::Parse)?;
    let raw = parsed.clips.ok_or(SelectorFailure::MissingClips)?;
    if raw.is_empty() {
        return Err(SelectorFailure::Empty);
    }

    let mut candidates = raw
        .into_iter()
        .enumerate()
        .map(|(index, segment)| {
            SegmentCandidate::from_raw(segment, duration_secs)
                .map_err(|reason| SelectorFailure::InvalidSegment { index, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;

    candidates.truncate(max_segments.max(1));
    Ok(candidates)
}

/// Strip markdown code fences and surrounding chatter from a model reply.
fn extract_json(reply: &str) -> &str {
    let text = reply.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text).trim();

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Deterministic segment windows derived from the duration alone.
///
/// Long sources are treated as `working_ceiling_secs` long. Up to three
/// windows are emitted (hook, mid, closing), each only when the working
/// duration reaches its threshold. When none qualify a single fallback
/// window is returned, so the result is never empty.
pub fn heuristic_segments(metadata: &VideoMetadata, cfg: &HeuristicConfig) -> Vec<SegmentCandidate> {
    let working = metadata.duration_secs_f64().min(cfg.working_ceiling_secs);
    let title = truncate_chars(&metadata.title, TITLE_PREFIX_CHARS);
    let mut segments = Vec::with_capacity(3);
    let mut hook_end = 0.0_f64;

    if working > cfg.window_secs {
        let start = cfg.intro_offset_secs;
        hook_end = (start + cfg.window_secs).min(working);
        segments.push(SegmentCandidate::new(
            start,
            hook_end,
            format!("Hook - {}", title),
            "Opening moment that sets up the video",
            cfg.hook_score,
        ));
    }

    if working > cfg.mid_threshold_secs {
        // Never overlap the hook on short sources
        let start = (working / 3.0).floor().max(hook_end);
        segments.push(SegmentCandidate::new(
            start,
            (start + cfg.window_secs).min(working),
            format!("Key moment - {}", title),
            "Core of the video",
            cfg.mid_score,
        ));
    }

    if working > cfg.closing_threshold_secs {
        let start = (working - cfg.closing_tail_secs)
            .max(working * cfg.closing_ratio)
            .floor();
        segments.push(SegmentCandidate::new(
            start,
            (start + cfg.window_secs).min(working),
            format!("Finale - {}", title),
            "Closing moment",
            cfg.closing_score,
        ));
    }

    if segments.is_empty() {
        let start = if working > cfg.fallback_offset_secs {
            cfg.fallback_offset_secs
        } else {
            0.0
        };
        let mut end = working.min(cfg.fallback_end_secs);
        if end <= start {
            // Only a zero-length source gets here. Config validation keeps
            // those out of the pipeline and the renderer rejects the window.
            end = start + cfg.window_secs;
        }
        segments.push(SegmentCandidate::new(
            start,
            end,
            format!("Highlight - {}", title),
            "Automatically selected segment",
            cfg.fallback_score,
        ));
    }

    segments
}
