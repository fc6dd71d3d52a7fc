//! Source URL validation.
//!
//! Every entry point that accepts a source URL goes through
//! [`validate_source_url`], so the accepted URL shapes are defined in exactly
//! one place.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Length of a YouTube video ID.
pub const YOUTUBE_ID_LEN: usize = 11;

/// Why a source URL was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UrlRejection {
    /// Input is empty after trimming
    Empty,
    /// Input could not be parsed as a URL
    Unparseable,
    /// Scheme is not http or https
    UnsupportedScheme(String),
    /// Host is not a supported video platform
    UnsupportedHost(String),
    /// Host is supported but no video ID was found
    VideoIdNotFound,
    /// A video ID was found but has an invalid format
    InvalidVideoId(String),
}

impl fmt::Display for UrlRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlRejection::Empty => write!(f, "URL is empty"),
            UrlRejection::Unparseable => write!(f, "URL could not be parsed"),
            UrlRejection::UnsupportedScheme(s) => write!(f, "unsupported URL scheme '{}'", s),
            UrlRejection::UnsupportedHost(h) => write!(f, "unsupported host '{}'", h),
            UrlRejection::VideoIdNotFound => write!(f, "video ID not found in URL"),
            UrlRejection::InvalidVideoId(id) => write!(f, "video ID '{}' has invalid format", id),
        }
    }
}

impl std::error::Error for UrlRejection {}

/// Outcome of validating a source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceValidation {
    Valid { video_id: String },
    Invalid { reason: UrlRejection },
}

impl SourceValidation {
    /// Convert into a `Result`, yielding the video ID on success.
    pub fn into_result(self) -> Result<String, UrlRejection> {
        match self {
            SourceValidation::Valid { video_id } => Ok(video_id),
            SourceValidation::Invalid { reason } => Err(reason),
        }
    }
}

/// Validate a source URL and extract its video ID.
///
/// Accepted forms (scheme optional, `www.`/`m.` prefixes allowed):
/// - `youtube.com/watch?v=VIDEO_ID`
/// - `youtube.com/embed/VIDEO_ID`
/// - `youtube.com/v/VIDEO_ID`
/// - `youtube.com/shorts/VIDEO_ID`
/// - `youtu.be/VIDEO_ID`
pub fn validate_source_url(input: &str) -> SourceValidation {
    match extract_video_id(input) {
        Ok(video_id) => SourceValidation::Valid { video_id },
        Err(reason) => SourceValidation::Invalid { reason },
    }
}

fn extract_video_id(input: &str) -> Result<String, UrlRejection> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UrlRejection::Empty);
    }

    let url = match Url::parse(input) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{}", input))
            .map_err(|_| UrlRejection::Unparseable)?,
        Err(_) => return Err(UrlRejection::Unparseable),
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlRejection::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let mut segments = url.path_segments().map(|s| s.collect::<Vec<_>>()).unwrap_or_default();
    segments.retain(|s| !s.is_empty());

    let candidate = if host == "youtu.be" {
        segments.first().map(|s| s.to_string())
    } else if is_youtube_host(&host) {
        match segments.as_slice() {
            ["watch", ..] => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            ["embed" | "v" | "shorts", id, ..] => Some(id.to_string()),
            _ => None,
        }
    } else {
        return Err(UrlRejection::UnsupportedHost(host));
    };

    let id = candidate.ok_or(UrlRejection::VideoIdNotFound)?;
    validate_video_id(id)
}

fn is_youtube_host(host: &str) -> bool {
    matches!(host, "youtube.com" | "www.youtube.com" | "m.youtube.com")
}

fn validate_video_id(id: String) -> Result<String, UrlRejection> {
    let well_formed = id.len() == YOUTUBE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(id)
    } else {
        Err(UrlRejection::InvalidVideoId(id))
    }
}
