//! Host-side glue used by the CLI: output paths, metadata collection and the
//! end-to-end run.

use crate::engine::{FfmpegEngine, TranscodeEngine};
use crate::errors::{GifError, Result};
use crate::metadata::{probe_metadata, MediaMetadata};
use crate::optimizer::OptimizeOutcome;
use crate::params::ConversionParameters;
use crate::session::{ConversionReport, EstimateReport, Session};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const GIF_EXTENSION: &str = "gif";

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub params: ConversionParameters,
    /// Output file, or a directory to place `<stem>.gif` in.
    pub output: Option<PathBuf>,
    pub force: bool,
    /// Run the auto-optimizer before converting.
    pub auto: bool,
    pub ffmpeg: Option<PathBuf>,
    /// Try ffprobe before falling back to the engine log.
    pub prefer_ffprobe: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            params: ConversionParameters::default(),
            output: None,
            force: false,
            auto: false,
            ffmpeg: None,
            prefer_ffprobe: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub metadata: MediaMetadata,
    pub estimate: Option<EstimateReport>,
    pub optimize: Option<OptimizeOutcome>,
    pub report: ConversionReport,
}

/// `<stem>.gif` beside the input, inside `output` when it is a directory,
/// or `output` itself when it already names a `.gif` file.
pub fn determine_output_path(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let path = match output {
        Some(target)
            if target
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(GIF_EXTENSION)) =>
        {
            target.to_path_buf()
        }
        Some(dir) => dir.join(format!("{}.{}", stem, GIF_EXTENSION)),
        None => input.with_extension(GIF_EXTENSION),
    };

    let input_canonical = input.canonicalize().unwrap_or_else(|_| input.to_path_buf());
    let output_canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
    if input == path || input_canonical == output_canonical {
        return Err(GifError::OutputPath(format!(
            "input and output are the same file: {}",
            input.display()
        )));
    }

    Ok(path)
}

/// Selects `input` in a fresh session and fills in its metadata: ffprobe
/// first when allowed, the engine probe log otherwise.
pub fn prepare_session<E: TranscodeEngine>(
    engine: E,
    input: &Path,
    prefer_ffprobe: bool,
) -> Result<Session<E>> {
    let mut session = Session::new(engine);
    session.select_file(Some(input))?;

    let probed = if prefer_ffprobe {
        probe_metadata(input).filter(MediaMetadata::is_complete)
    } else {
        None
    };

    match probed {
        Some(metadata) => {
            debug!(?metadata, "Metadata from ffprobe");
            session.set_metadata(metadata);
        }
        None => {
            session.load_engine()?;
            let metadata = session.extract_metadata()?;
            debug!(?metadata, "Metadata from engine log");
        }
    }
    Ok(session)
}

pub fn probe(input: &Path, ffmpeg: Option<PathBuf>) -> Result<MediaMetadata> {
    let session = prepare_session(FfmpegEngine::with_binary(ffmpeg), input, true)?;
    Ok(*session.metadata())
}

pub fn estimate(
    input: &Path,
    params: ConversionParameters,
    ffmpeg: Option<PathBuf>,
) -> Result<EstimateReport> {
    params.validate()?;
    let mut session = prepare_session(FfmpegEngine::with_binary(ffmpeg), input, true)?;
    session.set_params(params)?;
    session.estimate().ok_or(GifError::NoMetadata)
}

pub fn optimize(input: &Path, loop_count: u32, ffmpeg: Option<PathBuf>) -> Result<OptimizeOutcome> {
    let mut session = prepare_session(FfmpegEngine::with_binary(ffmpeg), input, true)?;
    session.set_loop_count(loop_count);
    session.auto_optimize()
}

/// Full conversion with the given engine.
pub fn run_with_engine<E: TranscodeEngine>(
    engine: E,
    input: &Path,
    config: &RunConfig,
    on_progress: Option<Box<dyn Fn(f64)>>,
) -> Result<RunSummary> {
    config.params.validate()?;

    let output = determine_output_path(input, config.output.as_deref())?;
    if output.exists() && !config.force {
        return Err(GifError::OutputExists(output));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut session = prepare_session(engine, input, config.prefer_ffprobe)?;
    session.load_engine()?;
    session.set_params(config.params)?;

    let optimize = if config.auto {
        Some(session.auto_optimize()?)
    } else {
        None
    };
    let estimate = session.estimate();
    let metadata = *session.metadata();

    let params = session.params();
    info!(
        input = %input.display(),
        output = %output.display(),
        fps = params.fps,
        max_width = params.max_width,
        max_colors = params.max_colors,
        dither = %params.dither,
        loop_count = params.loop_count,
        estimated = estimate.as_ref().map(|e| e.bytes),
        "Starting GIF conversion"
    );

    if let Some(observer) = on_progress {
        session.on_progress(observer);
    }
    let report = session.convert(&output)?;

    Ok(RunSummary {
        metadata,
        estimate,
        optimize,
        report,
    })
}

pub fn run(input: &Path, config: &RunConfig, on_progress: Option<Box<dyn Fn(f64)>>) -> Result<RunSummary> {
    let engine = FfmpegEngine::with_binary(config.ffmpeg.clone());
    run_with_engine(engine, input, config, on_progress)
}
