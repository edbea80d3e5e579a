//! Transcoding engine seam.
//!
//! The engine is an opaque command executor: it takes an ffmpeg-style
//! argument list, reports progress and log lines to subscribers, and leaves
//! its artifacts on disk. `FfmpegEngine` drives the real `ffmpeg` binary.

use crate::errors::{GifError, Result};
use crate::metadata::parse_metadata_from_log;
use shared_utils::logging::{execute_external_command, log_external_tool};
use shared_utils::{format_ffmpeg_error, locate_tool, FfmpegProcess, FfmpegProgressParser};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Fraction of the current run, 0.0..=1.0.
    Progress(f64),
    Log(String),
}

pub type SubscriptionId = u64;
pub type EventHandler = Box<dyn FnMut(&EngineEvent)>;

/// Handler registry shared by engine implementations.
#[derive(Default)]
pub struct Subscribers {
    next_id: SubscriptionId,
    handlers: Vec<(SubscriptionId, EventHandler)>,
}

impl Subscribers {
    pub fn add(&mut self, handler: EventHandler) -> SubscriptionId {
        self.next_id += 1;
        self.handlers.push((self.next_id, handler));
        self.next_id
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sid, _)| *sid != id);
        self.handlers.len() != before
    }

    pub fn emit(&mut self, event: &EngineEvent) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// What one engine run left behind.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: Option<i32>,
    pub log: String,
    pub duration: Duration,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turns a non-zero exit into `ConversionFailure` carrying the most
    /// relevant log line.
    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(GifError::ConversionFailure(format!(
                "exit code {:?}: {}",
                self.exit_code,
                format_ffmpeg_error(&self.log)
            )))
        }
    }
}

pub trait TranscodeEngine {
    /// Makes the engine usable. Idempotent once it has succeeded.
    fn load(&mut self) -> Result<()>;

    fn is_loaded(&self) -> bool;

    /// Runs one command to completion. A non-zero exit is reported in the
    /// outcome, not as an error.
    fn exec(&mut self, args: &[String]) -> Result<ExecOutcome>;

    fn on(&mut self, handler: EventHandler) -> SubscriptionId;

    fn off(&mut self, id: SubscriptionId) -> bool;

    /// Runs `op` with `handler` attached, detaching it afterwards whatever
    /// `op` returned.
    fn with_handler<T, F>(&mut self, handler: EventHandler, op: F) -> T
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> T,
    {
        let id = self.on(handler);
        let result = op(self);
        self.off(id);
        result
    }
}

// ═══════════════════════════════════════════════════════════════
// FfmpegEngine
// ═══════════════════════════════════════════════════════════════

/// Flags prepended to every run: overwrite, no stdin, machine-readable
/// progress on stdout.
const BASE_ARGS: [&str; 5] = ["-y", "-nostdin", "-progress", "pipe:1", "-nostats"];

pub struct FfmpegEngine {
    explicit: Option<PathBuf>,
    binary: Option<PathBuf>,
    subscribers: Subscribers,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::with_binary(None)
    }

    /// `explicit` takes precedence over the `PATH` lookup.
    pub fn with_binary(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            binary: None,
            subscribers: Subscribers::default(),
        }
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    fn forward_log(&mut self, lines: Vec<String>, parser: &mut FfmpegProgressParser) {
        for line in lines {
            if parser.total_duration().is_none() && line.contains("Duration:") {
                if let Some(duration) = parse_metadata_from_log(&line).duration_secs {
                    parser.set_total_duration(duration);
                }
            }
            self.subscribers.emit(&EngineEvent::Log(line));
        }
    }

    /// A successful run always ends on `Progress(1.0)`, even when ffmpeg
    /// exits before writing its `progress=end` record.
    fn finish_progress(&mut self, parser: &FfmpegProgressParser, success: bool) {
        if success && !parser.is_finished() {
            debug!(out_time = parser.current_time(), "No progress=end record");
            self.subscribers.emit(&EngineEvent::Progress(1.0));
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn load(&mut self) -> Result<()> {
        if self.binary.is_some() {
            return Ok(());
        }

        let binary = locate_tool("ffmpeg", self.explicit.as_deref()).ok_or_else(|| {
            GifError::EngineLoadFailure(match &self.explicit {
                Some(path) => format!("ffmpeg not found at {}", path.display()),
                None => "ffmpeg not found in PATH".to_string(),
            })
        })?;

        let probe = execute_external_command(&binary, "ffmpeg", &["-hide_banner", "-version"])
            .map_err(|e| GifError::EngineLoadFailure(format!("{:#}", e)))?;
        if probe.exit_code != Some(0) {
            return Err(GifError::EngineLoadFailure(format!(
                "{} -version exited with {:?}",
                binary.display(),
                probe.exit_code
            )));
        }

        let version = probe.stdout.lines().next().unwrap_or_default().to_string();
        info!(binary = %binary.display(), version = %version, "Engine loaded");
        self.binary = Some(binary);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.binary.is_some()
    }

    fn exec(&mut self, args: &[String]) -> Result<ExecOutcome> {
        let binary = self.binary.clone().ok_or(GifError::EngineNotLoaded)?;

        let full_args: Vec<String> = BASE_ARGS
            .iter()
            .map(|a| a.to_string())
            .chain(args.iter().cloned())
            .collect();

        if self.subscribers.is_empty() {
            debug!("No handlers attached; engine events are dropped");
        }

        let mut cmd = Command::new(&binary);
        cmd.args(&full_args);

        let start = Instant::now();
        let mut process = FfmpegProcess::spawn(&mut cmd)
            .map_err(|e| GifError::ConversionFailure(format!("{:#}", e)))?;
        let mut parser = FfmpegProgressParser::new(None);

        if let Some(stdout) = process.take_stdout() {
            for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                let pending = process.poll_stderr_lines();
                self.forward_log(pending, &mut parser);
                if let Some(fraction) = parser.parse_line(&line) {
                    self.subscribers.emit(&EngineEvent::Progress(fraction));
                }
            }
        } else {
            warn!("ffmpeg stdout not captured; no progress will be reported");
        }

        let (status, remaining, log) = process
            .wait_with_lines()
            .map_err(|e| GifError::ConversionFailure(format!("{:#}", e)))?;
        self.forward_log(remaining, &mut parser);
        self.finish_progress(&parser, status.success());

        let duration = start.elapsed();
        log_external_tool("ffmpeg", &full_args, &log, status.code(), duration);
        debug!(
            frames = parser.current_frame(),
            out_time = parser.current_time(),
            speed = parser.current_speed(),
            "ffmpeg run finished"
        );

        Ok(ExecOutcome {
            exit_code: status.code(),
            log,
            duration,
        })
    }

    fn on(&mut self, handler: EventHandler) -> SubscriptionId {
        self.subscribers.add(handler)
    }

    fn off(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}

// ═══════════════════════════════════════════════════════════════
// Scripted engine for tests
// ═══════════════════════════════════════════════════════════════


#[cfg(test)]
mod tests {
    use super::fake::ScriptedEngine;
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribers_add_remove() {
        let mut subs = Subscribers::default();
        assert!(subs.is_empty());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let a = subs.add(Box::new(move |e: &EngineEvent| sink.borrow_mut().push(e.clone())));
        let b = subs.add(Box::new(|_: &EngineEvent| {}));
        assert_ne!(a, b);
        assert_eq!(subs.len(), 2);

        subs.emit(&EngineEvent::Progress(0.25));
        assert!(subs.remove(a));
        assert!(!subs.remove(a));
        subs.emit(&EngineEvent::Progress(0.5));

        assert_eq!(*seen.borrow(), vec![EngineEvent::Progress(0.25)]);
        assert_eq!(subs.len(), 1);
        assert!(!subs.is_empty());
    }

    #[test]
    fn test_successful_run_ends_at_full_progress() {
        let mut engine = FfmpegEngine::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        engine.on(Box::new(move |e: &EngineEvent| sink.borrow_mut().push(e.clone())));

        let mut parser = FfmpegProgressParser::new(None);
        parser.set_total_duration(10.0);
        assert_eq!(parser.parse_line("out_time_us=4000000"), Some(0.4));

        engine.finish_progress(&parser, false);
        assert!(seen.borrow().is_empty());

        engine.finish_progress(&parser, true);
        assert_eq!(*seen.borrow(), vec![EngineEvent::Progress(1.0)]);

        // progress=end already reported 1.0
        parser.parse_line("progress=end");
        engine.finish_progress(&parser, true);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_with_handler_detaches_on_success_and_failure() {
        let mut engine = ScriptedEngine::new("Duration: 00:00:01.00");
        engine.loaded = true;

        let lines = Rc::new(RefCell::new(0usize));
        let counter = lines.clone();
        let ok: Result<ExecOutcome> = engine.with_handler(
            Box::new(move |e: &EngineEvent| {
                if matches!(e, EngineEvent::Log(_)) {
                    *counter.borrow_mut() += 1;
                }
            }),
            |eng| eng.exec(&["-hide_banner".into(), "-i".into(), "x.mp4".into()]),
        );
        assert!(ok.is_ok());
        assert_eq!(*lines.borrow(), 1);
        assert_eq!(engine.handler_count(), 0);

        engine.loaded = false;
        let err: Result<ExecOutcome> =
            engine.with_handler(Box::new(|_: &EngineEvent| {}), |eng| eng.exec(&[]));
        assert!(matches!(err, Err(GifError::EngineNotLoaded)));
        assert_eq!(engine.handler_count(), 0);
    }

    #[test]
    fn test_exec_outcome_into_result() {
        let ok = ExecOutcome {
            exit_code: Some(0),
            log: String::new(),
            duration: Duration::ZERO,
        };
        assert!(ok.into_result().is_ok());

        let failed = ExecOutcome {
            exit_code: Some(1),
            log: "frame=1\n[gif @ 0x1] Error while encoding\n".to_string(),
            duration: Duration::ZERO,
        };
        match failed.into_result() {
            Err(GifError::ConversionFailure(msg)) => assert!(msg.contains("Error while encoding")),
            other => panic!("unexpected: {:?}", other.map(|o| o.exit_code)),
        }
    }

    #[test]
    fn test_ffmpeg_engine_unloaded() {
        let mut engine = FfmpegEngine::with_binary(Some(PathBuf::from("/nonexistent/ffmpeg")));
        assert!(!engine.is_loaded());
        assert!(matches!(engine.exec(&[]), Err(GifError::EngineNotLoaded)));
        assert!(matches!(engine.load(), Err(GifError::EngineLoadFailure(_))));
        assert!(!engine.is_loaded());
    }
}
