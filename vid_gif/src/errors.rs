use crate::params::ParamError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GifError {
    #[error("Media metadata unavailable (duration/resolution unknown)")]
    NoMetadata,

    #[error("No parameter candidate produced a finite size estimate")]
    NoCandidate,

    #[error("Conversion engine failed to load: {0}")]
    EngineLoadFailure(String),

    #[error("Conversion failed: {0}")]
    ConversionFailure(String),

    #[error("Conversion engine is not loaded")]
    EngineNotLoaded,

    #[error("No input file selected")]
    NoFileSelected,

    #[error("A conversion is already running")]
    Busy,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ParamError),

    #[error("Invalid output path: {0}")]
    OutputPath(String),

    #[error("Output exists: {0}")]
    OutputExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GifError {
    /// Status text shown to the user when an action fails.
    pub fn user_message(&self) -> String {
        match self {
            GifError::NoMetadata => {
                "Could not read duration/resolution from the video.".to_string()
            }
            GifError::NoCandidate => {
                "No parameter set could be estimated for this video.".to_string()
            }
            GifError::EngineLoadFailure(_) => {
                "Failed to load the conversion engine. Make sure ffmpeg is installed or pass --ffmpeg <PATH>."
                    .to_string()
            }
            GifError::ConversionFailure(_) => {
                "Conversion failed. Try lowering FPS and/or setting a max width.".to_string()
            }
            GifError::EngineNotLoaded => "Load the engine first.".to_string(),
            GifError::NoFileSelected => "Select an MP4 first.".to_string(),
            GifError::Busy => "A conversion is already running.".to_string(),
            GifError::InvalidParameter(e) => format!("Invalid parameter: {}", e),
            GifError::OutputPath(msg) => format!("Invalid output path: {}", msg),
            GifError::OutputExists(path) => format!(
                "Output already exists: {} (use --force to overwrite)",
                path.display()
            ),
            GifError::Io(e) => format!("IO error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, GifError>;
