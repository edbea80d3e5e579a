//! Duration and resolution of the selected input.
//!
//! Two sources: ffprobe JSON, and the text log the engine prints when it
//! opens a file. The log is the fallback when ffprobe is not installed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use shared_utils::FFprobeResult;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MediaMetadata {
    pub fn new(duration_secs: f64, width: u32, height: u32) -> Self {
        Self {
            duration_secs: Some(duration_secs),
            width: Some(width),
            height: Some(height),
        }
    }

    /// All three fields present and the duration finite.
    pub fn is_complete(&self) -> bool {
        self.complete().is_some()
    }

    /// `(duration, width, height)` when complete.
    pub fn complete(&self) -> Option<(f64, u32, u32)> {
        match (self.duration_secs, self.width, self.height) {
            (Some(d), Some(w), Some(h)) if d.is_finite() => Some((d, w, h)),
            _ => None,
        }
    }

    pub fn from_probe(probe: &FFprobeResult) -> Self {
        debug!(
            format = %probe.format_name,
            codec = %probe.video_codec,
            frame_rate = probe.frame_rate,
            size = probe.size,
            "ffprobe result"
        );
        Self {
            duration_secs: probe.duration,
            width: probe.width,
            height: probe.height,
        }
    }
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Duration:\s*(\d+):(\d+):(\d+(?:\.\d+)?)").expect("valid duration regex")
    })
}

fn resolution_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*(\d{2,5})x(\d{2,5})[,\s]").expect("valid resolution regex"))
}

/// Pulls duration and resolution out of an ffmpeg banner log.
///
/// Fields that cannot be found stay `None`.
pub fn parse_metadata_from_log(log: &str) -> MediaMetadata {
    let duration_secs = duration_re().captures(log).and_then(|caps| {
        let h: f64 = caps.get(1)?.as_str().parse().ok()?;
        let m: f64 = caps.get(2)?.as_str().parse().ok()?;
        let s: f64 = caps.get(3)?.as_str().parse().ok()?;
        Some(h * 3600.0 + m * 60.0 + s)
    });

    let (width, height) = log
        .lines()
        .find(|line| line.contains("Video:"))
        .and_then(|line| resolution_re().captures(line))
        .and_then(|caps| {
            let w = caps.get(1)?.as_str().parse().ok()?;
            let h = caps.get(2)?.as_str().parse().ok()?;
            Some((w, h))
        })
        .map_or((None, None), |(w, h)| (Some(w), Some(h)));

    MediaMetadata {
        duration_secs,
        width,
        height,
    }
}

/// ffprobe-backed metadata; `None` if ffprobe is missing or fails.
pub fn probe_metadata(path: &Path) -> Option<MediaMetadata> {
    match shared_utils::probe_video(path) {
        Ok(probe) => Some(MediaMetadata::from_probe(&probe)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ffprobe unavailable, falling back to engine log");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &str = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':
  Metadata:
    major_brand     : isom
  Duration: 00:01:02.50, start: 0.000000, bitrate: 1205 kb/s
  Stream #0:0[0x1](und): Video: h264 (High) (avc1 / 0x31637661), yuv420p(progressive), 1280x720 [SAR 1:1 DAR 16:9], 1070 kb/s, 30 fps, 30 tbr, 15360 tbn (default)
  Stream #0:1[0x2](und): Audio: aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 128 kb/s (default)
At least one output file must be specified
";

    #[test]
    fn test_parse_full_banner() {
        let meta = parse_metadata_from_log(BANNER);
        assert_eq!(meta.duration_secs, Some(62.5));
        assert_eq!(meta.width, Some(1280));
        assert_eq!(meta.height, Some(720));
        assert!(meta.is_complete());
    }

    #[test]
    fn test_parse_hours() {
        let meta = parse_metadata_from_log("  Duration: 01:00:00.00, start: 0");
        assert_eq!(meta.duration_secs, Some(3600.0));
        assert_eq!(meta.width, None);
        assert!(!meta.is_complete());
    }

    #[test]
    fn test_parse_integer_seconds() {
        let meta = parse_metadata_from_log("Duration: 0:0:7");
        assert_eq!(meta.duration_secs, Some(7.0));
    }

    #[test]
    fn test_resolution_only_from_video_line() {
        let log = "Stream #0:1: Audio: aac, 44100 Hz, 1920x1080 ,\n\
                   Stream #0:0: Video: vp9, yuv420p, 640x360, 30 fps";
        let meta = parse_metadata_from_log(log);
        assert_eq!(meta.width, Some(640));
        assert_eq!(meta.height, Some(360));
        assert_eq!(meta.duration_secs, None);
    }

    #[test]
    fn test_first_video_line_wins() {
        let log = "Stream #0:0: Video: mjpeg, no size here\n\
                   Stream #0:1: Video: h264, yuv420p, 640x360, 30 fps";
        let meta = parse_metadata_from_log(log);
        assert_eq!(meta.width, None);
        assert_eq!(meta.height, None);
    }

    #[test]
    fn test_empty_log() {
        assert_eq!(parse_metadata_from_log(""), MediaMetadata::default());
    }

    #[test]
    fn test_non_finite_duration_incomplete() {
        let meta = MediaMetadata::new(f64::INFINITY, 640, 360);
        assert!(!meta.is_complete());
        let meta = MediaMetadata::new(f64::NAN, 640, 360);
        assert!(meta.complete().is_none());
    }

    #[test]
    fn test_from_probe() {
        let probe = FFprobeResult {
            format_name: "mov,mp4".to_string(),
            duration: Some(4.0),
            size: 1000,
            video_codec: "h264".to_string(),
            width: Some(320),
            height: Some(240),
            frame_rate: 25.0,
        };
        assert_eq!(MediaMetadata::from_probe(&probe), MediaMetadata::new(4.0, 320, 240));
    }
}
