//! Video metadata models.
//!
//! [`RawVideoInfo`] mirrors the loosely-typed JSON emitted by the metadata
//! tool; [`VideoMetadata::from_raw`] is the only way into the typed model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of characters kept from a video description.
pub const DESCRIPTION_MAX_CHARS: usize = 300;

/// Title used when the source reports none.
pub const DEFAULT_TITLE: &str = "Video";

/// Descriptive facts about a source video. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    pub title: String,

    /// Duration in whole seconds; the reference for all range validation
    pub duration_seconds: u64,

    /// Description truncated to [`DESCRIPTION_MAX_CHARS`]
    pub description: String,

    #[serde(default)]
    pub uploader: String,

    #[serde(default)]
    pub view_count: u64,

    /// Upload date as reported by the source (YYYYMMDD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
}

/// Raw metadata as reported by the external tool. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVideoInfo {
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub view_count: Option<i64>,
    pub upload_date: Option<String>,
}

/// Reasons raw metadata cannot be turned into [`VideoMetadata`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataRejection {
    #[error("source reported no duration")]
    MissingDuration,

    #[error("source reported an invalid duration: {0}")]
    InvalidDuration(f64),
}

impl VideoMetadata {
    /// Convert raw tool output into the typed model.
    ///
    /// Optional fields default to empty/zero; only a missing or invalid
    /// duration rejects the whole record.
    pub fn from_raw(raw: RawVideoInfo) -> Result<Self, MetadataRejection> {
        let duration = raw.duration.ok_or(MetadataRejection::MissingDuration)?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(MetadataRejection::InvalidDuration(duration));
        }

        let title = raw
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Ok(Self {
            title,
            duration_seconds: duration.floor() as u64,
            description: truncate_chars(raw.description.as_deref().unwrap_or_default(), DESCRIPTION_MAX_CHARS),
            uploader: raw.uploader.unwrap_or_default(),
            view_count: raw.view_count.unwrap_or(0).max(0) as u64,
            upload_date: raw.upload_date.filter(|d| !d.is_empty()),
        })
    }

    /// Duration as fractional seconds, for segment arithmetic.
    pub fn duration_secs_f64(&self) -> f64 {
        self.duration_seconds as f64
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
