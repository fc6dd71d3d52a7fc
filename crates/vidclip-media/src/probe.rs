//! FFprobe duration lookup.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::command::{check_ffprobe, last_stderr_line, run_tool};
use crate::error::{MediaError, MediaResult};

/// Upper bound for a single ffprobe call.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Duration of a local media file in seconds.
pub async fn probe_duration(path: &Path) -> MediaResult<f64> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let args = vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        path.to_string_lossy().to_string(),
    ];
    let output = run_tool("ffprobe", &args, PROBE_TIMEOUT).await?;
    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: last_stderr_line(&output),
        });
    }

    let duration = parse_probe_duration(&output.stdout)?;
    debug!(path = %path.display(), duration_secs = duration, "Probed content duration");
    Ok(duration)
}

/// Extract `format.duration` from ffprobe's JSON output.
pub fn parse_probe_duration(bytes: &[u8]) -> MediaResult<f64> {
    let probe: FfprobeOutput = serde_json::from_slice(bytes)?;
    let raw = probe.format.duration.ok_or_else(|| MediaError::FfprobeFailed {
        message: "no duration in probe output".to_string(),
    })?;
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(MediaError::FfprobeFailed {
            message: format!("invalid duration '{}'", raw),
        }),
    }
}
