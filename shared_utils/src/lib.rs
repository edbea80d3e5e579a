//! Shared Utilities for the vid_gif tools
//!
//! - Logging (tracing, rolling log file, external tool records)
//! - FFmpeg process management and progress parsing
//! - FFprobe wrapper for media metadata
//! - External tool discovery
//! - Progress bars and size/duration formatting
//! - Terminal colors
//! - Type-safe file sizes

pub mod colors;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod logging;
pub mod progress;
pub mod tools;
pub mod types;

pub use ffmpeg_process::{format_ffmpeg_error, FfmpegProcess, FfmpegProgressParser};
pub use ffprobe::{probe_video, FFprobeError, FFprobeResult};
pub use progress::{
    create_percent_bar, create_professional_spinner, format_bytes, format_bytes_f64,
    format_duration, format_seconds, fraction_to_percent,
};
pub use tools::locate_tool;
pub use types::FileSize;
