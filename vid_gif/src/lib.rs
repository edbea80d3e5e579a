//! vid-gif - MP4 to GIF conversion with size-aware auto-optimization
//!
//! - Byte-size estimator for live feedback
//! - Auto-optimizer: grid search over fps / width / colors / dither
//!   against a budget derived from the input size
//! - Two-pass ffmpeg palette workflow behind the `TranscodeEngine` trait
//! - `Session` state machine for front ends
//!
//! ```rust,ignore
//! use vid_gif::{run, RunConfig};
//! use std::path::Path;
//!
//! let config = RunConfig { auto: true, ..Default::default() };
//! let summary = run(Path::new("clip.mp4"), &config, None)?;
//! println!("{}", summary.report.output_size);
//! ```

pub mod conversion_api;
pub mod engine;
pub mod errors;
pub mod estimator;
pub mod filters;
pub mod metadata;
pub mod optimizer;
pub mod params;
pub mod session;

pub use conversion_api::{
    determine_output_path, estimate, optimize, prepare_session, probe, run, run_with_engine,
    RunConfig, RunSummary,
};
pub use engine::{EngineEvent, ExecOutcome, FfmpegEngine, SubscriptionId, TranscodeEngine};
pub use errors::{GifError, Result};
pub use metadata::{parse_metadata_from_log, MediaMetadata};
pub use optimizer::{auto_optimize, target_budget, Candidate, OptimizeOutcome};
pub use params::{clamp_max_colors, ColorPreset, ConversionParameters, DitherMode, ParamError};
pub use session::{ConversionReport, EstimateReport, Session, Status, StatusTone};
