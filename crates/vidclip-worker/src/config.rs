//! Pipeline configuration.
//!
//! Configuration is an explicit value handed to the orchestrator factory;
//! nothing reads process state after construction.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vidclip_media::DEFAULT_FORMATS;
use vidclip_models::RenderProfile;

use crate::error::{WorkerError, WorkerResult};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-job transient content lives under `work_dir/<job_id>/`
    pub work_dir: PathBuf,
    /// Rendered clips are written here
    pub output_dir: PathBuf,
    /// Shortest source accepted, in seconds
    pub min_duration_secs: u64,
    /// Longest source accepted, in seconds
    pub max_duration_secs: u64,
    /// Rendered clips are capped at this length
    pub max_clip_secs: f64,
    /// Maximum segments rendered in parallel within a job
    pub max_render_parallel: usize,
    pub metadata_timeout: Duration,
    /// Timeout for each format candidate
    pub retrieval_attempt_timeout: Duration,
    pub render_timeout: Duration,
    /// Downloads at or below this size count as failed
    pub min_content_bytes: u64,
    /// Format requests, highest preference first
    pub formats: Vec<String>,
    pub render_profile: RenderProfile,
    pub scoring: ScoringConfig,
    pub heuristic: HeuristicConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vidclip/work"),
            output_dir: PathBuf::from("./output"),
            min_duration_secs: 10,
            max_duration_secs: 600,
            max_clip_secs: 30.0,
            max_render_parallel: 2,
            metadata_timeout: Duration::from_secs(30),
            retrieval_attempt_timeout: Duration::from_secs(120),
            render_timeout: Duration::from_secs(300),
            min_content_bytes: 1024,
            formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
            render_profile: RenderProfile::default(),
            scoring: ScoringConfig::default(),
            heuristic: HeuristicConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    ///
    /// Absent or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("VIDCLIP_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("VIDCLIP_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            min_duration_secs: env_or("VIDCLIP_MIN_DURATION_SECS", defaults.min_duration_secs),
            max_duration_secs: env_or("VIDCLIP_MAX_DURATION_SECS", defaults.max_duration_secs),
            max_clip_secs: env_or("VIDCLIP_MAX_CLIP_SECS", defaults.max_clip_secs),
            max_render_parallel: env_or("VIDCLIP_MAX_RENDER_PARALLEL", defaults.max_render_parallel),
            metadata_timeout: Duration::from_secs(env_or("VIDCLIP_METADATA_TIMEOUT_SECS", 30)),
            retrieval_attempt_timeout: Duration::from_secs(env_or("VIDCLIP_DOWNLOAD_TIMEOUT_SECS", 120)),
            render_timeout: Duration::from_secs(env_or("VIDCLIP_RENDER_TIMEOUT_SECS", 300)),
            min_content_bytes: env_or("VIDCLIP_MIN_CONTENT_BYTES", defaults.min_content_bytes),
            formats: std::env::var("VIDCLIP_FORMATS")
                .ok()
                .map(|s| parse_list(&s))
                .filter(|f| !f.is_empty())
                .unwrap_or(defaults.formats),
            render_profile: defaults.render_profile,
            scoring: ScoringConfig::from_env(),
            heuristic: defaults.heuristic,
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        // A zero-length source has no span a clip could cover
        if self.min_duration_secs == 0 {
            return Err(WorkerError::config_error("min duration must be at least 1s"));
        }
        if self.min_duration_secs > self.max_duration_secs {
            return Err(WorkerError::config_error(format!(
                "min duration {}s exceeds max duration {}s",
                self.min_duration_secs, self.max_duration_secs
            )));
        }
        if !(self.max_clip_secs.is_finite() && self.max_clip_secs > 0.0) {
            return Err(WorkerError::config_error("max clip length must be positive"));
        }
        if self.max_render_parallel == 0 {
            return Err(WorkerError::config_error("render parallelism must be at least 1"));
        }
        if self.formats.is_empty() {
            return Err(WorkerError::config_error("at least one download format is required"));
        }
        self.heuristic.validate()
    }
}

/// External scoring service settings.
#[derive(Clone)]
pub struct ScoringConfig {
    /// Scoring is skipped entirely without a key
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Number of segments requested
    pub segment_count: usize,
    pub min_segment_secs: u32,
    pub max_segment_secs: u32,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            timeout: Duration::from_secs(30),
            segment_count: 3,
            min_segment_secs: 10,
            max_segment_secs: 30,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

// Keeps the API key out of logs
impl std::fmt::Debug for ScoringConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("segment_count", &self.segment_count)
            .field("min_segment_secs", &self.min_segment_secs)
            .field("max_segment_secs", &self.max_segment_secs)
            .finish_non_exhaustive()
    }
}

impl ScoringConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("DEEPSEEK_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: std::env::var("VIDCLIP_SCORING_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("VIDCLIP_SCORING_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(env_or("VIDCLIP_SCORING_TIMEOUT_SECS", 30)),
            segment_count: env_or("VIDCLIP_SEGMENT_COUNT", defaults.segment_count),
            min_segment_secs: defaults.min_segment_secs,
            max_segment_secs: defaults.max_segment_secs,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Deterministic fallback selection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicConfig {
    /// Long sources are treated as if they were this long
    pub working_ceiling_secs: f64,
    /// Length of every heuristic window
    pub window_secs: f64,
    /// Hook window skips this much intro
    pub intro_offset_secs: f64,
    /// Working duration required for the mid window
    pub mid_threshold_secs: f64,
    /// Working duration required for the closing window
    pub closing_threshold_secs: f64,
    /// Closing window starts at least this far from the end
    pub closing_tail_secs: f64,
    /// ...and no earlier than this fraction of the working duration
    pub closing_ratio: f64,
    /// Start of the single fallback window for very short sources
    pub fallback_offset_secs: f64,
    /// End of the single fallback window, capped by the duration
    pub fallback_end_secs: f64,
    pub hook_score: f64,
    pub mid_score: f64,
    pub closing_score: f64,
    pub fallback_score: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            working_ceiling_secs: 120.0,
            window_secs: 15.0,
            intro_offset_secs: 3.0,
            mid_threshold_secs: 45.0,
            closing_threshold_secs: 75.0,
            closing_tail_secs: 20.0,
            closing_ratio: 0.8,
            fallback_offset_secs: 5.0,
            fallback_end_secs: 20.0,
            hook_score: 0.8,
            mid_score: 0.75,
            closing_score: 0.7,
            fallback_score: 0.6,
        }
    }
}

impl HeuristicConfig {
    pub fn validate(&self) -> WorkerResult<()> {
        if !(self.window_secs > 0.0 && self.working_ceiling_secs > 0.0) {
            return Err(WorkerError::config_error("heuristic windows must be positive"));
        }
        if !(self.hook_score > self.mid_score && self.mid_score > self.closing_score) {
            return Err(WorkerError::config_error(
                "heuristic scores must descend from hook to closing",
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.formats.len(), 5);
        assert_eq!(config.formats[0], "best[height<=720][ext=mp4]");
        assert_eq!(config.formats[4], "best");
        assert!(!config.scoring.is_configured());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let config = PipelineConfig {
            min_duration_secs: 700,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            max_render_parallel: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_min_duration() {
        let config = PipelineConfig {
            min_duration_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(ref m) if m.contains("at least 1s")));

        let config = PipelineConfig {
            min_duration_secs: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_heuristic_scores_must_descend() {
        let heuristic = HeuristicConfig {
            mid_score: 0.9,
            ..Default::default()
        };
        assert!(heuristic.validate().is_err());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" best[ext=mp4] , ,best "), vec!["best[ext=mp4]", "best"]);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let scoring = ScoringConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", scoring);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("redacted"));
    }
}
