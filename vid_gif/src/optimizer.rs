//! Auto-optimizer: bounded grid search over fps, width, colors and dither.
//!
//! Every combination is estimated; the best in-budget candidate by quality
//! score wins, ties broken by the smaller estimate. When nothing fits the
//! budget, the smallest over-budget candidate is returned instead.

use crate::errors::{GifError, Result};
use crate::estimator::estimate;
use crate::metadata::MediaMetadata;
use crate::params::{ConversionParameters, DitherMode};
use serde::{Deserialize, Serialize};
use shared_utils::FileSize;
use tracing::{debug, info};

pub const FPS_CANDIDATES: [u32; 6] = [20, 18, 15, 12, 10, 8];
pub const COLOR_CANDIDATES: [u32; 3] = [128, 96, 64];

const WIDTHS_LARGE: &[u32] = &[720, 640, 560, 480, 400];
const WIDTHS_MEDIUM: &[u32] = &[720, 640, 480, 400];
const WIDTHS_SMALL: &[u32] = &[0, 720, 640, 480, 400];

pub fn dither_candidates() -> [DitherMode; 3] {
    [DitherMode::bayer(), DitherMode::Sierra2_4a, DitherMode::None]
}

/// Width caps to try for a source of the given width. 0 means no resize.
pub fn width_candidates(source_width: u32) -> &'static [u32] {
    if source_width >= 1200 {
        WIDTHS_LARGE
    } else if source_width >= 900 {
        WIDTHS_MEDIUM
    } else {
        WIDTHS_SMALL
    }
}

/// Output byte budget from the input size: ≤8 MB → 15 MB, ≤20 MB → 25 MB,
/// else 35 MB.
pub fn target_budget(file_size: FileSize) -> u64 {
    let mb = file_size.as_mb_f64();
    if mb <= 8.0 {
        15 * FileSize::MB
    } else if mb <= 20.0 {
        25 * FileSize::MB
    } else {
        35 * FileSize::MB
    }
}

/// Ordinal quality heuristic; higher is better.
pub fn quality_score(params: &ConversionParameters) -> u32 {
    let fps = match params.fps {
        f if f >= 15 => 3,
        f if f >= 12 => 2,
        _ => 1,
    };
    let colors = match params.max_colors {
        c if c >= 128 => 3,
        c if c >= 96 => 2,
        _ => 1,
    };
    let width = match params.max_width {
        0 => 3,
        w if w >= 640 => 2,
        _ => 1,
    };
    let dither = u32::from(!params.dither.is_none());
    fps + colors + width + dither
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub params: ConversionParameters,
    pub estimated_bytes: f64,
    pub quality_score: u32,
}

/// Result of a search: the winner plus the budget it was judged against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizeOutcome {
    pub candidate: Candidate,
    pub target_bytes: u64,
    pub evaluated: usize,
}

impl OptimizeOutcome {
    pub fn within_budget(&self) -> bool {
        self.candidate.estimated_bytes <= self.target_bytes as f64
    }
}

fn should_replace(best: Option<&Candidate>, next: &Candidate, target: f64) -> bool {
    let Some(best) = best else {
        return true;
    };
    if next.estimated_bytes <= target {
        best.estimated_bytes > target
            || next.quality_score > best.quality_score
            || (next.quality_score == best.quality_score
                && next.estimated_bytes < best.estimated_bytes)
    } else {
        best.estimated_bytes > target && next.estimated_bytes < best.estimated_bytes
    }
}

/// Searches the candidate grid.
///
/// `loop_count` is not part of the search; it is copied into the result so
/// the caller's setting survives.
pub fn auto_optimize(
    file_size: FileSize,
    meta: &MediaMetadata,
    loop_count: u32,
) -> Result<OptimizeOutcome> {
    let Some((_, source_width, _)) = meta.complete() else {
        return Err(GifError::NoMetadata);
    };

    let target_bytes = target_budget(file_size);
    let target = target_bytes as f64;
    let widths = width_candidates(source_width);
    debug!(
        input = %file_size,
        target = %FileSize::new(target_bytes),
        source_width,
        "auto-optimize search"
    );

    let mut best: Option<Candidate> = None;
    let mut evaluated = 0usize;

    for &fps in &FPS_CANDIDATES {
        for &max_width in widths {
            for &max_colors in &COLOR_CANDIDATES {
                for dither in dither_candidates() {
                    let params = ConversionParameters {
                        fps,
                        max_width,
                        max_colors,
                        dither,
                        loop_count,
                    };
                    let estimated_bytes = estimate(meta, &params);
                    if !estimated_bytes.is_finite() {
                        continue;
                    }
                    evaluated += 1;

                    let candidate = Candidate {
                        params,
                        estimated_bytes,
                        quality_score: quality_score(&params),
                    };
                    if should_replace(best.as_ref(), &candidate, target) {
                        best = Some(candidate);
                    }
                }
            }
        }
    }

    let candidate = best.ok_or(GifError::NoCandidate)?;
    info!(
        fps = candidate.params.fps,
        max_width = candidate.params.max_width,
        max_colors = candidate.params.max_colors,
        dither = %candidate.params.dither,
        score = candidate.quality_score,
        estimated = candidate.estimated_bytes,
        within_budget = candidate.estimated_bytes <= target,
        "auto-optimize picked candidate"
    );

    Ok(OptimizeOutcome {
        candidate,
        target_bytes,
        evaluated,
    })
}
