//! Conversion session: the state one user interaction works against.
//!
//! Holds the selected file, its metadata, the current parameters and the
//! status/progress a front end displays. Each user-triggered action is a
//! method; failures are surfaced both as `Err` and as status text.

use crate::engine::{EngineEvent, EventHandler, TranscodeEngine};
use crate::errors::{GifError, Result};
use crate::estimator::{estimate, estimate_hint};
use crate::filters::{encode_args, palette_args, probe_args};
use crate::metadata::{parse_metadata_from_log, MediaMetadata};
use crate::optimizer::{auto_optimize, OptimizeOutcome};
use crate::params::{clamp_fps, ColorPreset, ConversionParameters, DitherMode};
use serde::Serialize;
use shared_utils::FileSize;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const MSG_SELECT_FILE: &str = "Select an MP4 to begin.";
pub const MSG_FILE_SELECTED: &str = "File selected. Load the engine.";
pub const MSG_CONVERSION_FAILED: &str =
    "Conversion failed. Try lowering FPS and/or setting a max width.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Muted,
    Warn,
    Ok,
    Err,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub text: String,
    pub tone: StatusTone,
}

impl Status {
    fn new(text: impl Into<String>, tone: StatusTone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub path: PathBuf,
    pub size: FileSize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateReport {
    pub bytes: f64,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub input_size: FileSize,
    pub output_size: FileSize,
    pub params: ConversionParameters,
}

/// Removes the palette image on drop, whatever path the conversion took.
struct PaletteGuard {
    path: PathBuf,
}

impl Drop for PaletteGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove temp palette file");
            }
        }
    }
}

pub struct Session<E: TranscodeEngine> {
    engine: E,
    selection: Option<Selection>,
    metadata: MediaMetadata,
    params: ConversionParameters,
    status: Status,
    /// Shared with the progress handler attached during `convert`.
    progress: Rc<Cell<f64>>,
    progress_observer: Option<Rc<dyn Fn(f64)>>,
    busy: bool,
    last_output: Option<ConversionReport>,
}

impl<E: TranscodeEngine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            selection: None,
            metadata: MediaMetadata::default(),
            params: ConversionParameters::default(),
            status: Status::new(MSG_SELECT_FILE, StatusTone::Muted),
            progress: Rc::new(Cell::new(0.0)),
            progress_observer: None,
            busy: false,
            last_output: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// For attaching extra subscribers, e.g. a terminal progress bar.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub fn params(&self) -> &ConversionParameters {
        &self.params
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// 0.0..=1.0
    pub fn progress(&self) -> f64 {
        self.progress.get()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn last_output(&self) -> Option<&ConversionReport> {
        self.last_output.as_ref()
    }

    fn set_status(&mut self, text: impl Into<String>, tone: StatusTone) {
        self.status = Status::new(text, tone);
        debug!(status = %self.status.text, tone = ?self.status.tone, "status");
    }

    /// Called with the overall fraction whenever conversion progress moves.
    pub fn on_progress(&mut self, observer: impl Fn(f64) + 'static) {
        self.progress_observer = Some(Rc::new(observer));
    }

    fn set_progress(&mut self, fraction: f64) {
        let fraction = clamp_fraction(fraction);
        self.progress.set(fraction);
        if let Some(observer) = &self.progress_observer {
            observer(fraction);
        }
    }

    /// Maps one pass's 0..=1 progress onto `[offset, offset + span]`.
    fn pass_handler(&self, offset: f64, span: f64) -> EventHandler {
        let progress = self.progress.clone();
        let observer = self.progress_observer.clone();
        Box::new(move |event: &EngineEvent| {
            if let EngineEvent::Progress(p) = event {
                let overall = offset + clamp_fraction(*p) * span;
                progress.set(overall);
                if let Some(observer) = &observer {
                    observer(overall);
                }
            }
        })
    }

    // ───────────────────────────────────────────────────────────
    // Selection
    // ───────────────────────────────────────────────────────────

    /// Replaces the selection. Metadata is cleared, never merged; `None`
    /// clears the selection entirely.
    pub fn select_file(&mut self, path: Option<&Path>) -> Result<()> {
        self.metadata = MediaMetadata::default();
        self.last_output = None;
        self.set_progress(0.0);

        let Some(path) = path else {
            self.selection = None;
            self.set_status(MSG_SELECT_FILE, StatusTone::Muted);
            return Ok(());
        };

        let size = match fs::metadata(path) {
            Ok(meta) => FileSize::new(meta.len()),
            Err(e) => {
                self.selection = None;
                self.set_status(format!("Cannot read {}: {}", path.display(), e), StatusTone::Err);
                return Err(e.into());
            }
        };

        info!(path = %path.display(), size = %size, "File selected");
        self.selection = Some(Selection {
            path: path.to_path_buf(),
            size,
        });
        self.set_status(MSG_FILE_SELECTED, StatusTone::Warn);
        Ok(())
    }

    /// Clears selection, metadata, progress and output. Parameters and the
    /// engine are kept.
    pub fn reset(&mut self) {
        self.selection = None;
        self.metadata = MediaMetadata::default();
        self.last_output = None;
        self.set_progress(0.0);
        self.set_status(MSG_SELECT_FILE, StatusTone::Muted);
    }

    /// Loads the engine once. A failure leaves it unloaded so a later call
    /// can retry.
    pub fn load_engine(&mut self) -> Result<()> {
        if self.engine.is_loaded() {
            return Ok(());
        }
        self.set_status("Loading engine...", StatusTone::Muted);
        match self.engine.load() {
            Ok(()) => {
                self.set_status("Engine ready.", StatusTone::Ok);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Engine load failed");
                self.set_status(e.user_message(), StatusTone::Err);
                Err(e)
            }
        }
    }

    // ───────────────────────────────────────────────────────────
    // Metadata, estimate, optimizer
    // ───────────────────────────────────────────────────────────

    /// Installs metadata obtained elsewhere, e.g. from ffprobe.
    pub fn set_metadata(&mut self, metadata: MediaMetadata) {
        self.metadata = metadata;
    }

    /// Probes the selected file through the engine and parses the captured
    /// log. The probe run itself is expected to fail and is ignored.
    pub fn extract_metadata(&mut self) -> Result<MediaMetadata> {
        let path = self
            .selection
            .as_ref()
            .map(|s| s.path.clone())
            .ok_or(GifError::NoFileSelected)?;
        if !self.engine.is_loaded() {
            return Err(GifError::EngineNotLoaded);
        }

        let captured = Rc::new(RefCell::new(String::new()));
        let sink = captured.clone();
        let args = probe_args(&path);
        let probe = self.engine.with_handler(
            Box::new(move |event: &EngineEvent| {
                if let EngineEvent::Log(line) = event {
                    let mut log = sink.borrow_mut();
                    log.push_str(line);
                    log.push('\n');
                }
            }),
            |engine| engine.exec(&args),
        );
        if let Err(e) = probe {
            debug!(error = %e, "Probe run failed; using whatever log was captured");
        }

        let log = captured.borrow().clone();
        self.metadata = parse_metadata_from_log(&log);
        debug!(metadata = ?self.metadata, "Metadata extracted");
        Ok(self.metadata)
    }

    /// Current estimate and hint; `None` without a selection or with
    /// incomplete metadata.
    pub fn estimate(&self) -> Option<EstimateReport> {
        self.selection.as_ref()?;
        if !self.metadata.is_complete() {
            return None;
        }
        Some(EstimateReport {
            bytes: estimate(&self.metadata, &self.params),
            hint: estimate_hint(&self.metadata, &self.params),
        })
    }

    /// Searches for parameters and applies the winner. The loop count is
    /// left as the user set it.
    pub fn auto_optimize(&mut self) -> Result<OptimizeOutcome> {
        let size = match &self.selection {
            Some(selection) => selection.size,
            None => {
                self.set_status("Select an MP4 first.", StatusTone::Warn);
                return Err(GifError::NoFileSelected);
            }
        };

        match auto_optimize(size, &self.metadata, self.params.loop_count) {
            Ok(outcome) => {
                self.params = outcome.candidate.params;
                let text = if outcome.within_budget() {
                    "Auto-optimize applied."
                } else {
                    "Auto-optimize applied (still above the target size)."
                };
                self.set_status(text, StatusTone::Ok);
                Ok(outcome)
            }
            Err(e) => {
                self.set_status(e.user_message(), StatusTone::Warn);
                Err(e)
            }
        }
    }

    // ───────────────────────────────────────────────────────────
    // Parameter setters
    // ───────────────────────────────────────────────────────────

    pub fn set_params(&mut self, params: ConversionParameters) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.params.fps = clamp_fps(fps);
    }

    pub fn set_max_width(&mut self, max_width: u32) {
        self.params.max_width = max_width;
    }

    /// Clamps, stores and returns the label the count now maps to.
    pub fn set_max_colors(&mut self, value: f64) -> ColorPreset {
        self.params.set_max_colors(value)
    }

    pub fn set_color_preset(&mut self, preset: ColorPreset) {
        self.params.apply_preset(preset);
    }

    pub fn set_dither(&mut self, dither: DitherMode) -> Result<()> {
        dither.validate()?;
        self.params.dither = dither;
        Ok(())
    }

    pub fn set_loop_count(&mut self, loop_count: u32) {
        self.params.loop_count = loop_count;
    }

    // ───────────────────────────────────────────────────────────
    // Convert
    // ───────────────────────────────────────────────────────────

    /// Palette pass, then encode pass, into `output`.
    ///
    /// No retry and no parameter relaxation on failure: progress goes back
    /// to 0 and the session is ready for another attempt.
    pub fn convert(&mut self, output: &Path) -> Result<ConversionReport> {
        if !self.engine.is_loaded() {
            let e = GifError::EngineNotLoaded;
            self.set_status(e.user_message(), StatusTone::Warn);
            return Err(e);
        }
        let Some(selection) = self.selection.clone() else {
            let e = GifError::NoFileSelected;
            self.set_status(e.user_message(), StatusTone::Warn);
            return Err(e);
        };
        if self.busy {
            return Err(GifError::Busy);
        }
        if let Err(e) = self.params.validate() {
            let e = GifError::from(e);
            self.set_status(e.user_message(), StatusTone::Err);
            return Err(e);
        }

        self.busy = true;
        self.last_output = None;
        self.set_progress(0.0);
        self.set_status("Converting...", StatusTone::Muted);

        let result = self.run_conversion(&selection, output);
        self.busy = false;

        match result {
            Ok(report) => {
                self.set_progress(1.0);
                self.set_status(
                    format!("Done! GIF size: {}", report.output_size),
                    StatusTone::Ok,
                );
                info!(
                    input = %report.input.display(),
                    output = %report.output.display(),
                    size = %report.output_size,
                    "Conversion finished"
                );
                self.last_output = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Conversion failed");
                self.set_progress(0.0);
                self.set_status(MSG_CONVERSION_FAILED, StatusTone::Err);
                Err(e)
            }
        }
    }

    fn run_conversion(&mut self, selection: &Selection, output: &Path) -> Result<ConversionReport> {
        // Refresh so the estimate shown afterwards matches this file.
        if let Err(e) = self.extract_metadata() {
            debug!(error = %e, "Metadata refresh failed; converting anyway");
        }

        let palette = PaletteGuard {
            path: output.with_extension("palette.png"),
        };
        let params = self.params;

        let pass_args = palette_args(&selection.path, &palette.path, &params);
        let handler = self.pass_handler(0.0, 0.5);
        self.engine
            .with_handler(handler, |engine| engine.exec(&pass_args))?
            .into_result()?;
        if !palette.path.exists() {
            return Err(GifError::ConversionFailure(
                "palette was not generated".to_string(),
            ));
        }

        let pass_args = encode_args(&selection.path, &palette.path, output, &params);
        let handler = self.pass_handler(0.5, 0.5);
        self.engine
            .with_handler(handler, |engine| engine.exec(&pass_args))?
            .into_result()?;

        let output_size = fs::metadata(output)
            .map(|m| FileSize::new(m.len()))
            .map_err(|e| GifError::ConversionFailure(format!("output not written: {}", e)))?;

        Ok(ConversionReport {
            input: selection.path.clone(),
            output: output.to_path_buf(),
            input_size: selection.size,
            output_size,
            params,
        })
    }
}

fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}
