//! Conversion parameters, dither modes and the color-count preset rule.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const FPS_MIN: u32 = 1;
pub const FPS_MAX: u32 = 60;

pub const MAX_COLORS_MIN: u32 = 32;
pub const MAX_COLORS_MAX: u32 = 256;

pub const BAYER_SCALE_MAX: u8 = 5;
pub const BAYER_SCALE_DEFAULT: u8 = 2;

pub const DEFAULT_FPS: u32 = 12;
pub const DEFAULT_MAX_WIDTH: u32 = 480;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("fps {0} out of range [1, 60]")]
    FpsOutOfRange(u32),

    #[error("max colors {0} out of range [32, 256]")]
    ColorsOutOfRange(u32),

    #[error("bayer scale {0} out of range [0, 5]")]
    BayerScaleOutOfRange(u8),

    #[error("unknown dither mode '{0}' (expected none, bayer[:bayer_scale=N], floyd_steinberg, sierra2, sierra2_4a)")]
    UnknownDither(String),

    #[error("unknown color preset '{0}' (expected 256, 192, 128, 96, 64)")]
    UnknownPreset(String),
}

// ============================================================================
// DitherMode
// ============================================================================

/// Error-diffusion strategy for `paletteuse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DitherMode {
    None,
    Bayer { scale: u8 },
    FloydSteinberg,
    Sierra2,
    #[allow(non_camel_case_types)]
    Sierra2_4a,
}

impl DitherMode {
    pub const fn bayer() -> Self {
        DitherMode::Bayer {
            scale: BAYER_SCALE_DEFAULT,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DitherMode::None)
    }

    /// Argument value for `paletteuse=dither=`.
    pub fn as_ffmpeg_arg(&self) -> String {
        match self {
            DitherMode::None => "none".to_string(),
            DitherMode::Bayer { scale } => format!("bayer:bayer_scale={}", scale),
            DitherMode::FloydSteinberg => "floyd_steinberg".to_string(),
            DitherMode::Sierra2 => "sierra2".to_string(),
            DitherMode::Sierra2_4a => "sierra2_4a".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        match self {
            DitherMode::Bayer { scale } if *scale > BAYER_SCALE_MAX => {
                Err(ParamError::BayerScaleOutOfRange(*scale))
            }
            _ => Ok(()),
        }
    }
}

impl Default for DitherMode {
    fn default() -> Self {
        DitherMode::Sierra2_4a
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_ffmpeg_arg())
    }
}

impl FromStr for DitherMode {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, options) = match s.split_once(':') {
            Some((name, options)) => (name, Some(options)),
            None => (s, None),
        };

        let mode = match (name.to_ascii_lowercase().as_str(), options) {
            ("none", None) => DitherMode::None,
            ("bayer", None) => DitherMode::bayer(),
            ("bayer", Some(options)) => {
                let scale = options
                    .strip_prefix("bayer_scale=")
                    .and_then(|v| v.parse::<u8>().ok())
                    .ok_or_else(|| ParamError::UnknownDither(s.to_string()))?;
                DitherMode::Bayer { scale }
            }
            ("floyd_steinberg", None) => DitherMode::FloydSteinberg,
            ("sierra2", None) => DitherMode::Sierra2,
            ("sierra2_4a", None) => DitherMode::Sierra2_4a,
            _ => return Err(ParamError::UnknownDither(s.to_string())),
        };
        mode.validate()?;
        Ok(mode)
    }
}

impl From<DitherMode> for String {
    fn from(mode: DitherMode) -> Self {
        mode.as_ffmpeg_arg()
    }
}

impl TryFrom<String> for DitherMode {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Color count: clamping and preset sync
// ============================================================================

/// Rounds to the nearest integer and clamps to [32, 256]. NaN maps to 256.
pub fn clamp_max_colors(value: f64) -> u32 {
    if value.is_nan() {
        return MAX_COLORS_MAX;
    }
    value
        .round()
        .clamp(MAX_COLORS_MIN as f64, MAX_COLORS_MAX as f64) as u32
}

/// Clamps a frame rate into [1, 60].
pub fn clamp_fps(value: u32) -> u32 {
    value.clamp(FPS_MIN, FPS_MAX)
}

/// Labeled color counts. Any other count is `Custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorPreset {
    Colors256,
    Colors192,
    Colors128,
    Colors96,
    Colors64,
    Custom,
}

impl ColorPreset {
    pub const ALL: [ColorPreset; 5] = [
        ColorPreset::Colors256,
        ColorPreset::Colors192,
        ColorPreset::Colors128,
        ColorPreset::Colors96,
        ColorPreset::Colors64,
    ];

    /// Label derived by set membership.
    pub fn from_colors(colors: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|p| p.colors() == Some(colors))
            .unwrap_or(ColorPreset::Custom)
    }

    pub fn colors(&self) -> Option<u32> {
        match self {
            ColorPreset::Colors256 => Some(256),
            ColorPreset::Colors192 => Some(192),
            ColorPreset::Colors128 => Some(128),
            ColorPreset::Colors96 => Some(96),
            ColorPreset::Colors64 => Some(64),
            ColorPreset::Custom => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ColorPreset::Colors256 => "256",
            ColorPreset::Colors192 => "192",
            ColorPreset::Colors128 => "128",
            ColorPreset::Colors96 => "96",
            ColorPreset::Colors64 => "64",
            ColorPreset::Custom => "custom",
        }
    }
}

impl fmt::Display for ColorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ColorPreset {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.label() == s)
            .ok_or_else(|| ParamError::UnknownPreset(s.to_string()))
    }
}

// ============================================================================
// ConversionParameters
// ============================================================================

/// Everything that determines the estimate and the engine arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionParameters {
    pub fps: u32,
    /// 0 keeps the original width.
    pub max_width: u32,
    pub max_colors: u32,
    pub dither: DitherMode,
    /// 0 loops forever.
    pub loop_count: u32,
}

impl Default for ConversionParameters {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            max_width: DEFAULT_MAX_WIDTH,
            max_colors: MAX_COLORS_MAX,
            dither: DitherMode::default(),
            loop_count: 0,
        }
    }
}

impl ConversionParameters {
    pub fn validate(&self) -> Result<(), ParamError> {
        if !(FPS_MIN..=FPS_MAX).contains(&self.fps) {
            return Err(ParamError::FpsOutOfRange(self.fps));
        }
        if !(MAX_COLORS_MIN..=MAX_COLORS_MAX).contains(&self.max_colors) {
            return Err(ParamError::ColorsOutOfRange(self.max_colors));
        }
        self.dither.validate()
    }

    /// Writes the clamped color count and returns the re-derived label.
    pub fn set_max_colors(&mut self, value: f64) -> ColorPreset {
        self.max_colors = clamp_max_colors(value);
        self.color_preset()
    }

    /// Writes the preset's color count; `Custom` leaves the count unchanged.
    pub fn apply_preset(&mut self, preset: ColorPreset) {
        if let Some(colors) = preset.colors() {
            self.max_colors = colors;
        }
    }

    pub fn color_preset(&self) -> ColorPreset {
        ColorPreset::from_colors(self.max_colors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_max_colors() {
        assert_eq!(clamp_max_colors(999.0), 256);
        assert_eq!(clamp_max_colors(1.0), 32);
        assert_eq!(clamp_max_colors(100.4), 100);
        assert_eq!(clamp_max_colors(95.5), 96);
        assert_eq!(clamp_max_colors(f64::INFINITY), 256);
        assert_eq!(clamp_max_colors(f64::NEG_INFINITY), 32);
        assert_eq!(clamp_max_colors(f64::NAN), 256);
    }

    #[test]
    fn test_preset_labels() {
        assert_eq!(ColorPreset::from_colors(96).label(), "96");
        assert_eq!(ColorPreset::from_colors(100).label(), "custom");
        assert_eq!(ColorPreset::from_colors(256), ColorPreset::Colors256);
        assert_eq!(ColorPreset::from_colors(32), ColorPreset::Custom);
    }

    #[test]
    fn test_preset_two_way_sync() {
        let mut params = ConversionParameters::default();
        assert_eq!(params.set_max_colors(96.0), ColorPreset::Colors96);
        assert_eq!(params.set_max_colors(100.0), ColorPreset::Custom);
        assert_eq!(params.max_colors, 100);

        params.apply_preset(ColorPreset::Colors192);
        assert_eq!(params.max_colors, 192);
        assert_eq!(params.color_preset(), ColorPreset::Colors192);

        params.apply_preset(ColorPreset::Custom);
        assert_eq!(params.max_colors, 192);
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("128".parse::<ColorPreset>().unwrap(), ColorPreset::Colors128);
        assert!("custom".parse::<ColorPreset>().is_err());
        assert!("100".parse::<ColorPreset>().is_err());
    }

    #[test]
    fn test_dither_parse_and_render() {
        let cases: &[(&str, DitherMode)] = &[
            ("none", DitherMode::None),
            ("bayer", DitherMode::Bayer { scale: 2 }),
            ("bayer:bayer_scale=2", DitherMode::Bayer { scale: 2 }),
            ("bayer:bayer_scale=5", DitherMode::Bayer { scale: 5 }),
            ("floyd_steinberg", DitherMode::FloydSteinberg),
            ("sierra2", DitherMode::Sierra2),
            ("sierra2_4a", DitherMode::Sierra2_4a),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<DitherMode>().unwrap(), *expected, "{}", input);
        }
        assert_eq!(DitherMode::bayer().to_string(), "bayer:bayer_scale=2");
        assert_eq!(DitherMode::Sierra2_4a.to_string(), "sierra2_4a");
    }

    #[test]
    fn test_dither_parse_rejects() {
        assert!(matches!(
            "bayer:bayer_scale=9".parse::<DitherMode>(),
            Err(ParamError::BayerScaleOutOfRange(9))
        ));
        assert!(matches!(
            "heckbert".parse::<DitherMode>(),
            Err(ParamError::UnknownDither(_))
        ));
        assert!("none:x=1".parse::<DitherMode>().is_err());
        assert!("bayer:scale=2".parse::<DitherMode>().is_err());
    }

    #[test]
    fn test_dither_serde_as_string() {
        let json = serde_json::to_string(&DitherMode::bayer()).unwrap();
        assert_eq!(json, "\"bayer:bayer_scale=2\"");
        let back: DitherMode = serde_json::from_str("\"sierra2_4a\"").unwrap();
        assert_eq!(back, DitherMode::Sierra2_4a);
    }

    #[test]
    fn test_validate() {
        assert!(ConversionParameters::default().validate().is_ok());

        let mut params = ConversionParameters { fps: 0, ..Default::default() };
        assert_eq!(params.validate(), Err(ParamError::FpsOutOfRange(0)));
        params.fps = 61;
        assert_eq!(params.validate(), Err(ParamError::FpsOutOfRange(61)));
        params.fps = 60;
        params.max_colors = 31;
        assert_eq!(params.validate(), Err(ParamError::ColorsOutOfRange(31)));
        params.max_colors = 32;
        params.dither = DitherMode::Bayer { scale: 6 };
        assert_eq!(params.validate(), Err(ParamError::BayerScaleOutOfRange(6)));
    }

    #[test]
    fn test_clamp_fps() {
        assert_eq!(clamp_fps(0), 1);
        assert_eq!(clamp_fps(15), 15);
        assert_eq!(clamp_fps(120), 60);
    }
}
