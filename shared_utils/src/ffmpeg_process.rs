//! FFmpeg process management.
//!
//! Piping both stdout and stderr while reading only stdout deadlocks once
//! ffmpeg fills the stderr pipe buffer (~64KB). `FfmpegProcess` drains stderr
//! on its own thread and hands the lines back through a channel, so callers
//! can read `-progress pipe:1` records from stdout and still see the log.
//!
//! ```ignore
//! use shared_utils::ffmpeg_process::{FfmpegProcess, FfmpegProgressParser};
//! use std::io::{BufRead, BufReader};
//! use std::process::Command;
//!
//! let mut cmd = Command::new("ffmpeg");
//! cmd.args(["-progress", "pipe:1", "-nostats", "-i", "in.mp4", "out.gif"]);
//! let mut process = FfmpegProcess::spawn(&mut cmd)?;
//! let mut parser = FfmpegProgressParser::new(None);
//! parser.set_total_duration(10.0);
//! if let Some(stdout) = process.take_stdout() {
//!     for line in BufReader::new(stdout).lines() {
//!         if let Some(p) = parser.parse_line(&line?) {
//!             println!("{:.0}%", p * 100.0);
//!         }
//!     }
//! }
//! let (status, _, stderr) = process.wait_with_lines()?;
//! ```

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess
// ═══════════════════════════════════════════════════════════════

pub struct FfmpegProcess {
    child: Child,
    stderr_lines: Receiver<String>,
    stderr_thread: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Spawns the configured command with stdout and stderr piped.
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        info!(command = ?cmd, "Executing FFmpeg command");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().context("Failed to spawn FFmpeg process")?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture FFmpeg stderr"))?;

        let (tx, rx) = mpsc::channel();
        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                buf.push_str(&line);
                buf.push('\n');
                // Receiver may be gone once the owner stopped polling.
                let _ = tx.send(line);
            }
            buf
        });

        Ok(Self {
            child,
            stderr_lines: rx,
            stderr_thread: Some(stderr_thread),
        })
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Stderr lines produced since the last call, without blocking.
    pub fn poll_stderr_lines(&self) -> Vec<String> {
        self.stderr_lines.try_iter().collect()
    }

    /// Waits for exit. Returns the status, the stderr lines not yet polled,
    /// and the complete stderr text.
    pub fn wait_with_lines(mut self) -> Result<(ExitStatus, Vec<String>, String)> {
        let status = self.child.wait().context("Failed to wait for FFmpeg")?;
        let stderr = self
            .stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default();
        let remaining: Vec<String> = self.stderr_lines.try_iter().collect();

        if status.success() {
            info!(exit_code = status.code(), "FFmpeg process completed successfully");
        } else {
            info!(exit_code = status.code(), "FFmpeg process exited with failure");
        }
        debug!(stderr_output = %stderr, "FFmpeg stderr output");

        Ok((status, remaining, stderr))
    }
}

// ═══════════════════════════════════════════════════════════════
// FfmpegProgressParser
// ═══════════════════════════════════════════════════════════════

/// Turns ffmpeg progress output into a 0.0..=1.0 fraction.
///
/// Understands `-progress` records (`frame=`, `out_time=`, `out_time_us=`,
/// `out_time_ms=`, `progress=end`) and classic stats fields (`time=`,
/// `fps=`, `speed=`).
#[derive(Debug, Clone)]
pub struct FfmpegProgressParser {
    total_frames: Option<u64>,
    total_duration: Option<f64>,
    current_frame: u64,
    current_time: f64,
    current_fps: f64,
    current_speed: f64,
    finished: bool,
}

impl FfmpegProgressParser {
    pub fn new(total_frames: Option<u64>) -> Self {
        Self {
            total_frames,
            total_duration: None,
            current_frame: 0,
            current_time: 0.0,
            current_fps: 0.0,
            current_speed: 0.0,
            finished: false,
        }
    }

    /// Late duration, e.g. once the `Duration:` log line has been seen.
    pub fn set_total_duration(&mut self, total_duration: f64) {
        if total_duration.is_finite() && total_duration > 0.0 {
            self.total_duration = Some(total_duration);
        }
    }

    pub fn total_duration(&self) -> Option<f64> {
        self.total_duration
    }

    /// Feeds one line; returns the progress fraction when it can be computed.
    pub fn parse_line(&mut self, line: &str) -> Option<f64> {
        for field in line.split_whitespace() {
            if let Some((key, value)) = field.split_once('=') {
                self.apply_field(key, value);
            }
        }
        // "frame=  123" style stats put the value in the next token.
        if let Some(rest) = line.trim().strip_prefix("frame=") {
            if let Some(Ok(frame)) = rest.split_whitespace().next().map(str::parse::<u64>) {
                self.current_frame = frame;
            }
        }

        self.calculate_progress()
    }

    fn apply_field(&mut self, key: &str, value: &str) {
        let value = value.trim();
        match key {
            "frame" => {
                if let Ok(frame) = value.parse::<u64>() {
                    self.current_frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse::<f64>() {
                    self.current_fps = fps;
                }
            }
            "time" | "out_time" => {
                if let Some(time) = Self::parse_time(value) {
                    self.current_time = time;
                }
            }
            // out_time_ms is microseconds as well.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    if us > 0 {
                        self.current_time = us as f64 / 1_000_000.0;
                    }
                }
            }
            "speed" => {
                if let Ok(speed) = value.trim_end_matches('x').parse::<f64>() {
                    self.current_speed = speed;
                }
            }
            "progress" => {
                self.finished = value == "end";
            }
            _ => {}
        }
    }

    /// `HH:MM:SS.ms` to seconds.
    pub fn parse_time(time_str: &str) -> Option<f64> {
        let parts: Vec<&str> = time_str.split(':').collect();
        if parts.len() != 3 {
            return None;
        }

        let hours: f64 = parts[0].parse().ok()?;
        let minutes: f64 = parts[1].parse().ok()?;
        let seconds: f64 = parts[2].parse().ok()?;

        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    }

    fn calculate_progress(&self) -> Option<f64> {
        if self.finished {
            return Some(1.0);
        }

        if let Some(total) = self.total_frames {
            if total > 0 && self.current_frame > 0 {
                return Some((self.current_frame as f64 / total as f64).min(1.0));
            }
        }

        if let Some(total) = self.total_duration {
            if total > 0.0 && self.current_time > 0.0 {
                return Some((self.current_time / total).min(1.0));
            }
        }

        None
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn current_fps(&self) -> f64 {
        self.current_fps
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

// ═══════════════════════════════════════════════════════════════
// Error formatting
// ═══════════════════════════════════════════════════════════════

/// Picks the most meaningful line of an ffmpeg stderr dump: the last line
/// mentioning an error, else the last non-progress line.
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_progress_parser_frame_accuracy(
            current in 1u64..10000,
            total in 1u64..10000
        ) {
            let mut parser = FfmpegProgressParser::new(Some(total));
            let progress = parser.parse_line(&format!("frame={}", current));
            let expected = (current as f64 / total as f64).min(1.0);
            prop_assert!(progress.is_some());
            prop_assert!((progress.unwrap() - expected).abs() < 0.001);
        }

        #[test]
        fn prop_progress_never_exceeds_one(
            us in 0i64..1_000_000_000,
            total_duration in 1.0f64..3600.0
        ) {
            let mut parser = FfmpegProgressParser::new(None);
            parser.set_total_duration(total_duration);
            if let Some(p) = parser.parse_line(&format!("out_time_us={}", us)) {
                prop_assert!((0.0..=1.0).contains(&p));
            }
        }

        #[test]
        fn prop_format_error_non_empty(content in "[a-zA-Z0-9 ]{1,100}") {
            prop_assert!(!format_ffmpeg_error(&content).is_empty());
        }
    }
}
