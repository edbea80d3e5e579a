//! FFprobe wrapper module
//!
//! Reads container duration, size and the first video stream's geometry
//! from `ffprobe -print_format json`.

use crate::logging::execute_external_command;
use crate::tools::locate_tool;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FFprobeError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    #[error("FFprobe failed: {0}")]
    ExecutionFailed(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FFprobeResult {
    pub format_name: String,
    /// Seconds; `None` when the container does not report one.
    pub duration: Option<f64>,
    pub size: u64,
    pub video_codec: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: f64,
}

pub fn probe_video(path: &Path) -> Result<FFprobeResult, FFprobeError> {
    let ffprobe = locate_tool("ffprobe", None).ok_or_else(|| {
        FFprobeError::ToolNotFound("ffprobe not found. Install ffmpeg first".to_string())
    })?;

    if !path.is_file() {
        return Err(FFprobeError::ExecutionFailed(format!(
            "Not a file: {}",
            path.display()
        )));
    }

    let path_str = path.to_str().ok_or_else(|| {
        FFprobeError::ExecutionFailed(format!("Invalid path encoding: {}", path.display()))
    })?;

    let output = execute_external_command(
        &ffprobe,
        "ffprobe",
        &[
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "--",
            path_str,
        ],
    )
    .map_err(|e| FFprobeError::ExecutionFailed(e.to_string()))?;

    if output.exit_code != Some(0) {
        let stderr = output.stderr.trim();
        let error_msg = if stderr.is_empty() {
            format!(
                "ffprobe failed to analyze file: {} (exit code: {:?})",
                path.display(),
                output.exit_code
            )
        } else {
            format!("ffprobe error for '{}': {}", path.display(), stderr)
        };
        return Err(FFprobeError::ExecutionFailed(error_msg));
    }

    parse_probe_json(&output.stdout)
}

/// Parses the JSON document printed by `ffprobe -show_format -show_streams`.
pub fn parse_probe_json(json_str: &str) -> Result<FFprobeResult, FFprobeError> {
    let json: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| FFprobeError::ParseError(e.to_string()))?;

    let format = &json["format"];
    let format_name = format["format_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();
    let duration = format["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);
    let size = format["size"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| FFprobeError::ParseError("No streams found".to_string()))?;

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| FFprobeError::ParseError("No video stream found".to_string()))?;

    let video_codec = video_stream["codec_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();
    let width = video_stream["width"]
        .as_u64()
        .filter(|w| *w > 0)
        .map(|w| w as u32);
    let height = video_stream["height"]
        .as_u64()
        .filter(|h| *h > 0)
        .map(|h| h as u32);
    let frame_rate = parse_frame_rate(video_stream["r_frame_rate"].as_str().unwrap_or("0/1"));

    // Stream duration backs up a missing container duration.
    let duration = duration.or_else(|| {
        video_stream["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    });

    Ok(FFprobeResult {
        format_name,
        duration,
        size,
        video_codec,
        width,
        height,
        frame_rate,
    })
}

/// `30000/1001`-style or decimal rate; 0.0 when unparseable.
pub fn parse_frame_rate(s: &str) -> f64 {
    if let Some((num, den)) = s.split_once('/') {
        let num = num.parse::<f64>().unwrap_or(0.0);
        let den = den.parse::<f64>().unwrap_or(0.0);
        if den > 0.0 && num > 0.0 {
            return num / den;
        }
        return 0.0;
    }
    match s.parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => v,
        _ => 0.0,
    }
}
