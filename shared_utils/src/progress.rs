//! Progress display and human-readable formatting.
//!
//! Progress bars follow the quiet flag so JSON output and tests stay clean.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub mod progress_style {
    pub const PROGRESS_CHARS: &str = "█▓░";

    pub const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

    pub const PERCENT_TEMPLATE: &str =
        "{spinner:.green} {prefix:.cyan.bold} ▕{bar:35.green/black}▏ {pos:>3}% • ⏱️ {elapsed_precise} • {msg}";

    pub const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix:.cyan.bold} {msg}";
}

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_quiet_mode(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet_mode() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// 0..=100 bar driven by engine progress fractions.
pub fn create_percent_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);

    if is_quiet_mode() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template(progress_style::PERCENT_TEMPLATE)
                .expect("Invalid progress bar template")
                .progress_chars(progress_style::PROGRESS_CHARS)
                .tick_chars(progress_style::SPINNER_CHARS),
        );
        pb.set_prefix(prefix.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}

pub fn create_professional_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if is_quiet_mode() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template(progress_style::SPINNER_TEMPLATE)
                .expect("Invalid spinner template")
                .tick_chars(progress_style::SPINNER_CHARS),
        );
        pb.set_prefix(prefix.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}

/// Maps a 0..=1 fraction onto a whole percentage, clamped.
pub fn fraction_to_percent(fraction: f64) -> u64 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction * 100.0).round().clamp(0.0, 100.0) as u64
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Like [`format_bytes`] for fractional estimates; unknown values render as "—".
pub fn format_bytes_f64(bytes: f64) -> String {
    if !bytes.is_finite() || bytes < 0.0 {
        return "—".to_string();
    }
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut n = bytes;
    let mut i = 0;
    while n >= 1024.0 && i < UNITS.len() - 1 {
        n /= 1024.0;
        i += 1;
    }
    if i == 0 {
        format!("{:.0} {}", n, UNITS[i])
    } else {
        format!("{:.2} {}", n, UNITS[i])
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Media duration in seconds, rounded to whole seconds; unknown or
/// non-positive values render as "—".
pub fn format_seconds(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "—".to_string();
    }
    format_duration(Duration::from_secs(secs.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(15 * 1024 * 1024), "15.00 MB");
    }

    #[test]
    fn test_format_bytes_f64_unknown() {
        assert_eq!(format_bytes_f64(f64::INFINITY), "—");
        assert_eq!(format_bytes_f64(f64::NAN), "—");
        assert_eq!(format_bytes_f64(-1.0), "—");
    }

    #[test]
    fn test_format_bytes_f64_units() {
        assert_eq!(format_bytes_f64(512.4), "512 B");
        assert_eq!(format_bytes_f64(163840.0), "160.00 KB");
        assert_eq!(format_bytes_f64(2.5 * 1024.0 * 1024.0), "2.50 MB");
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "—");
        assert_eq!(format_seconds(f64::NAN), "—");
        assert_eq!(format_seconds(9.6), "10s");
        assert_eq!(format_seconds(125.0), "2m 5s");
        assert_eq!(format_seconds(3725.0), "1h 2m 5s");
    }

    #[test]
    fn test_fraction_to_percent_clamps() {
        assert_eq!(fraction_to_percent(-0.5), 0);
        assert_eq!(fraction_to_percent(0.424), 42);
        assert_eq!(fraction_to_percent(1.7), 100);
        assert_eq!(fraction_to_percent(f64::NAN), 0);
    }
}
