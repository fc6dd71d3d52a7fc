//! Fixed output profile for rendered clips.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Throughput over compression: clips are short-lived
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 28;
pub const DEFAULT_MAX_RATE: &str = "1M";
pub const DEFAULT_BUF_SIZE: &str = "2M";
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_AUDIO_CHANNELS: u8 = 2;

/// Vertical 9:16 output
pub const DEFAULT_WIDTH: u32 = 720;
pub const DEFAULT_HEIGHT: u32 = 1280;

/// Output profile applied to every rendered clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderProfile {
    pub width: u32,
    pub height: u32,

    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Peak bitrate cap (`-maxrate`)
    pub max_rate: String,

    /// Rate-control buffer (`-bufsize`)
    pub buf_size: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    pub audio_sample_rate: u32,
    pub audio_channels: u8,

    /// Move the moov atom to the front for immediate playback
    #[serde(default = "default_true")]
    pub fast_start: bool,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_true() -> bool {
    true
}

impl Default for RenderProfile {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            max_rate: DEFAULT_MAX_RATE.to_string(),
            buf_size: DEFAULT_BUF_SIZE.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_sample_rate: DEFAULT_AUDIO_SAMPLE_RATE,
            audio_channels: DEFAULT_AUDIO_CHANNELS,
            fast_start: true,
        }
    }
}

impl RenderProfile {
    /// Letterbox filter: fit inside the target frame, pad the rest.
    pub fn video_filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = self.width,
            h = self.height
        )
    }

    /// Human-readable format descriptor stored on each rendered clip.
    pub fn descriptor(&self) -> String {
        let orientation = if self.height > self.width {
            "vertical"
        } else if self.height < self.width {
            "horizontal"
        } else {
            "square"
        };
        format!("{}x{} ({})", self.width, self.height, orientation)
    }

    /// Encoder arguments placed after the inputs, excluding the video filter.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-maxrate".to_string(),
            self.max_rate.clone(),
            "-bufsize".to_string(),
            self.buf_size.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-ar".to_string(),
            self.audio_sample_rate.to_string(),
            "-ac".to_string(),
            self.audio_channels.to_string(),
        ];
        if self.fast_start {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }
        args
    }
}
