//! GIF byte-size estimation.
//!
//! The model is a heuristic: frames × per-frame bytes plus a fixed
//! container overhead. It drives both the live estimate and the
//! auto-optimizer objective.

use crate::metadata::MediaMetadata;
use crate::params::{ConversionParameters, DitherMode};

/// Average fraction of pixels that change between frames.
pub const MOTION_FACTOR: f64 = 0.22;
/// Undithered output compresses better.
pub const NO_DITHER_FACTOR: f64 = 0.88;
pub const COLOR_EXPONENT: f64 = 0.85;
pub const MIN_BYTES_PER_FRAME: f64 = 320.0;
/// Header, palette and extension blocks.
pub const OVERHEAD_BYTES: f64 = 160.0 * 1024.0;

/// Output dimensions after the `max_width` cap, aspect preserved.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if max_width > 0 && width > max_width {
        let ratio = max_width as f64 / width as f64;
        let w = (width as f64 * ratio).round() as u32;
        let h = (height as f64 * ratio).round() as u32;
        (w, h)
    } else {
        (width, height)
    }
}

fn dither_factor(dither: &DitherMode) -> f64 {
    if dither.is_none() {
        NO_DITHER_FACTOR
    } else {
        1.0
    }
}

fn color_factor(max_colors: u32) -> f64 {
    (max_colors as f64 / 256.0).powf(COLOR_EXPONENT)
}

/// Predicted output size in bytes.
///
/// Returns `f64::INFINITY` when the metadata is incomplete.
pub fn estimate(meta: &MediaMetadata, params: &ConversionParameters) -> f64 {
    let Some((duration, width, height)) = meta.complete() else {
        return f64::INFINITY;
    };

    let (w, h) = scaled_dimensions(width, height, params.max_width);
    let frames = duration * params.fps as f64;
    let pixels = w as f64 * h as f64;

    let raw = pixels * MOTION_FACTOR * dither_factor(&params.dither) * color_factor(params.max_colors)
        / 8.0;
    let bytes_per_frame = raw.max(MIN_BYTES_PER_FRAME);

    frames * bytes_per_frame + OVERHEAD_BYTES
}

/// Explanation shown next to the estimate. Empty when metadata is incomplete.
pub fn estimate_hint(meta: &MediaMetadata, params: &ConversionParameters) -> String {
    let Some((_, width, height)) = meta.complete() else {
        return String::new();
    };

    let mut parts = vec!["Based on duration × FPS and resolution.".to_string()];
    if params.max_width > 0 && width > params.max_width {
        let (w, h) = scaled_dimensions(width, height, params.max_width);
        parts.push(format!("Resized to ~{}×{}.", w, h));
    }
    parts.push("May vary with motion and detail.".to_string());
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(fps: u32, max_width: u32, max_colors: u32, dither: DitherMode) -> ConversionParameters {
        ConversionParameters {
            fps,
            max_width,
            max_colors,
            dither,
            loop_count: 0,
        }
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn test_reference_value_with_resize() {
        // 1280x720 capped at 640 → 640x360; 120 frames of 6336 bytes.
        let meta = MediaMetadata::new(10.0, 1280, 720);
        let p = params(12, 640, 256, DitherMode::Sierra2_4a);
        let est = estimate(&meta, &p);
        assert!(approx_eq(est, 120.0 * 6336.0 + 163840.0), "got {}", est);
    }

    #[test]
    fn test_no_dither_example_bit_exact() {
        // 150 frames at 640x360 with a 128-color palette and no dithering.
        let meta = MediaMetadata::new(10.0, 1280, 720);
        let p = params(15, 640, 128, DitherMode::None);
        let per_frame = f64::max(320.0, 230400.0 * 0.22 * 0.88 * 0.5f64.powf(0.85) / 8.0);
        let expected = 150.0 * per_frame + 163840.0;
        assert_eq!(estimate(&meta, &p).to_bits(), expected.to_bits());
    }

    #[test]
    fn test_per_frame_floor() {
        let meta = MediaMetadata::new(1.0, 32, 32);
        let p = params(10, 0, 256, DitherMode::Sierra2_4a);
        assert!(approx_eq(estimate(&meta, &p), 10.0 * 320.0 + 163840.0));
    }

    #[test]
    fn test_zero_duration_is_overhead_only() {
        let meta = MediaMetadata::new(0.0, 1920, 1080);
        let p = ConversionParameters::default();
        assert!(approx_eq(estimate(&meta, &p), OVERHEAD_BYTES));
    }

    #[test]
    fn test_incomplete_metadata_is_infinite() {
        let p = ConversionParameters::default();
        let cases = [
            MediaMetadata::default(),
            MediaMetadata { duration_secs: None, ..MediaMetadata::new(1.0, 640, 360) },
            MediaMetadata { width: None, ..MediaMetadata::new(1.0, 640, 360) },
            MediaMetadata { height: None, ..MediaMetadata::new(1.0, 640, 360) },
            MediaMetadata::new(f64::INFINITY, 640, 360),
            MediaMetadata::new(f64::NAN, 640, 360),
        ];
        for meta in cases {
            assert_eq!(estimate(&meta, &p), f64::INFINITY, "{:?}", meta);
        }
    }

    #[test]
    fn test_no_dither_and_color_factors() {
        let meta = MediaMetadata::new(2.0, 640, 360);
        let full = estimate(&meta, &params(10, 0, 256, DitherMode::Sierra2_4a));
        let none = estimate(&meta, &params(10, 0, 256, DitherMode::None));
        let half = estimate(&meta, &params(10, 0, 128, DitherMode::Sierra2_4a));

        let frames_bytes = full - OVERHEAD_BYTES;
        assert!(approx_eq(none - OVERHEAD_BYTES, frames_bytes * 0.88));
        assert!(approx_eq(half - OVERHEAD_BYTES, frames_bytes * 0.5f64.powf(0.85)));
    }

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(1280, 720, 640), (640, 360));
        assert_eq!(scaled_dimensions(1280, 720, 0), (1280, 720));
        assert_eq!(scaled_dimensions(480, 270, 640), (480, 270));
        assert_eq!(scaled_dimensions(640, 360, 640), (640, 360));
        assert_eq!(scaled_dimensions(1920, 1080, 960), (960, 540));
        assert_eq!(scaled_dimensions(1920, 1080, 1920), (1920, 1080));
        assert_eq!(scaled_dimensions(1920, 1080, 4096), (1920, 1080));
        assert_eq!(scaled_dimensions(1000, 561, 333), (333, 187));
    }

    #[test]
    fn test_hint() {
        let meta = MediaMetadata::new(3.0, 1280, 720);
        let p = params(12, 640, 256, DitherMode::Sierra2_4a);
        assert_eq!(
            estimate_hint(&meta, &p),
            "Based on duration × FPS and resolution. Resized to ~640×360. May vary with motion and detail."
        );

        let p = params(12, 0, 256, DitherMode::Sierra2_4a);
        assert_eq!(
            estimate_hint(&meta, &p),
            "Based on duration × FPS and resolution. May vary with motion and detail."
        );

        assert!(estimate_hint(&MediaMetadata::default(), &p).is_empty());
    }

    fn dither_strategy() -> impl Strategy<Value = DitherMode> {
        prop_oneof![
            Just(DitherMode::None),
            Just(DitherMode::bayer()),
            Just(DitherMode::Sierra2_4a),
            Just(DitherMode::FloydSteinberg),
        ]
    }

    proptest! {
        #[test]
        fn prop_estimate_finite_and_above_overhead(
            duration in 0.0f64..3600.0,
            width in 2u32..8000,
            height in 2u32..8000,
            fps in 1u32..=60,
            max_width in prop::sample::select(vec![0u32, 320, 480, 640, 720, 1280]),
            colors in 32u32..=256,
            dither in dither_strategy(),
        ) {
            let meta = MediaMetadata::new(duration, width, height);
            let est = estimate(&meta, &params(fps, max_width, colors, dither));
            prop_assert!(est.is_finite());
            prop_assert!(est >= OVERHEAD_BYTES);
        }

        #[test]
        fn prop_monotonic_in_fps_and_duration(
            duration in 0.1f64..600.0,
            width in 16u32..4000,
            height in 16u32..4000,
            fps in 1u32..60,
            colors in 32u32..=256,
            dither in dither_strategy(),
        ) {
            let meta = MediaMetadata::new(duration, width, height);
            let lo = estimate(&meta, &params(fps, 0, colors, dither));
            let hi = estimate(&meta, &params(fps + 1, 0, colors, dither));
            prop_assert!(hi >= lo);

            let longer = MediaMetadata::new(duration * 2.0, width, height);
            prop_assert!(estimate(&longer, &params(fps, 0, colors, dither)) >= lo);
        }

        #[test]
        fn prop_monotonic_in_colors(
            width in 16u32..4000,
            height in 16u32..4000,
            colors in 32u32..256,
            dither in dither_strategy(),
        ) {
            let meta = MediaMetadata::new(5.0, width, height);
            let lo = estimate(&meta, &params(12, 0, colors, dither));
            let hi = estimate(&meta, &params(12, 0, colors + 1, dither));
            prop_assert!(hi >= lo);
        }

        #[test]
        fn prop_no_dither_never_larger(
            width in 16u32..4000,
            height in 16u32..4000,
            colors in 32u32..=256,
        ) {
            let meta = MediaMetadata::new(5.0, width, height);
            let dithered = estimate(&meta, &params(12, 0, colors, DitherMode::Sierra2_4a));
            let plain = estimate(&meta, &params(12, 0, colors, DitherMode::None));
            prop_assert!(plain <= dithered);
        }

        #[test]
        fn prop_resize_never_larger(
            width in 16u32..4000,
            height in 16u32..4000,
            max_width in 1u32..4000,
        ) {
            let meta = MediaMetadata::new(5.0, width, height);
            let full = estimate(&meta, &params(12, 0, 256, DitherMode::Sierra2_4a));
            let capped = estimate(&meta, &params(12, max_width, 256, DitherMode::Sierra2_4a));
            prop_assert!(capped <= full);
        }
    }
}
