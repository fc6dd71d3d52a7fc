//! Segment candidates and the validation boundary for scored segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A proposed time window within the source, with a relevance score.
///
/// Invariants: `0 <= start_seconds < end_seconds`, `viral_score` in `[0, 1]`.
/// `end_seconds` never exceeds the parent video's duration once the candidate
/// has passed through [`SegmentCandidate::from_raw`] or
/// [`SegmentCandidate::clamp_to_duration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentCandidate {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub title: String,
    pub description: String,
    pub viral_score: f64,
}

/// A segment as returned by the external scoring service, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSegment {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub viral_score: Option<f64>,
}

/// Why a raw segment could not be accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentRejection {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("non-finite value in '{0}'")]
    NonFinite(&'static str),

    #[error("negative start time {0}")]
    NegativeStart(f64),

    #[error("empty range {start}..{end} after clamping")]
    EmptyRange { start: f64, end: f64 },
}

impl SegmentCandidate {
    /// Create a candidate from already-trusted values (heuristic output).
    pub fn new(
        start_seconds: f64,
        end_seconds: f64,
        title: impl Into<String>,
        description: impl Into<String>,
        viral_score: f64,
    ) -> Self {
        Self {
            start_seconds,
            end_seconds,
            title: title.into(),
            description: description.into(),
            viral_score: viral_score.clamp(0.0, 1.0),
        }
    }

    /// Convert a raw scored segment into a candidate bounded by `duration_secs`.
    ///
    /// Out-of-range scores are clamped into `[0, 1]` and an end past the
    /// video's duration is pulled back to it. Missing bounds, non-finite
    /// numbers, negative starts and ranges that end up empty are rejected.
    pub fn from_raw(raw: RawSegment, duration_secs: f64) -> Result<Self, SegmentRejection> {
        let start = raw.start_time.ok_or(SegmentRejection::MissingField("start_time"))?;
        let end = raw.end_time.ok_or(SegmentRejection::MissingField("end_time"))?;
        let score = raw.viral_score.ok_or(SegmentRejection::MissingField("viral_score"))?;
        let title = raw.title.ok_or(SegmentRejection::MissingField("title"))?;

        if !start.is_finite() {
            return Err(SegmentRejection::NonFinite("start_time"));
        }
        if !end.is_finite() {
            return Err(SegmentRejection::NonFinite("end_time"));
        }
        if !score.is_finite() {
            return Err(SegmentRejection::NonFinite("viral_score"));
        }
        if start < 0.0 {
            return Err(SegmentRejection::NegativeStart(start));
        }

        let candidate = Self::new(
            start,
            end,
            title.trim(),
            raw.description.unwrap_or_default().trim(),
            score,
        );
        candidate.clamp_to_duration(duration_secs)
    }

    /// Pull `end_seconds` back to `duration_secs` if it overshoots.
    pub fn clamp_to_duration(mut self, duration_secs: f64) -> Result<Self, SegmentRejection> {
        if self.end_seconds > duration_secs {
            self.end_seconds = duration_secs;
        }
        if self.end_seconds <= self.start_seconds {
            return Err(SegmentRejection::EmptyRange {
                start: self.start_seconds,
                end: self.end_seconds,
            });
        }
        Ok(self)
    }

    /// Limit the span to `max_secs` by moving the end earlier, never later.
    pub fn limited_to(&self, max_secs: f64) -> Self {
        let mut clamped = self.clone();
        if clamped.duration_secs() > max_secs {
            clamped.end_seconds = clamped.start_seconds + max_secs;
        }
        clamped
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}
