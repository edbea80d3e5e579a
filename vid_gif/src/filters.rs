//! ffmpeg argument building for the two-pass palette workflow.

use crate::params::ConversionParameters;
use std::path::Path;

/// Lanczos scale filter; width capped at `max_width`, height keeps the
/// aspect ratio and stays even.
pub fn scale_filter(max_width: u32) -> String {
    if max_width > 0 {
        format!("scale='min(iw,{})':-2:flags=lanczos", max_width)
    } else {
        "scale=iw:ih:flags=lanczos".to_string()
    }
}

/// Shared `fps=…,scale=…` chain for both passes.
pub fn build_filters(params: &ConversionParameters) -> String {
    format!("fps={},{}", params.fps, scale_filter(params.max_width))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Pass 1: generate the palette image.
pub fn palette_args(input: &Path, palette: &Path, params: &ConversionParameters) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-vf".to_string(),
        format!(
            "{},palettegen=max_colors={}:stats_mode=diff",
            build_filters(params),
            params.max_colors
        ),
        path_arg(palette),
    ]
}

/// Pass 2: map frames onto the palette and write the GIF.
pub fn encode_args(
    input: &Path,
    palette: &Path,
    output: &Path,
    params: &ConversionParameters,
) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-i".to_string(),
        path_arg(palette),
        "-lavfi".to_string(),
        format!(
            "[0:v]{}[x];[x][1:v]paletteuse=dither={}:diff_mode=rectangle",
            build_filters(params),
            params.dither
        ),
        "-loop".to_string(),
        params.loop_count.to_string(),
        path_arg(output),
    ]
}

/// Opens the input without an output; ffmpeg exits non-zero but prints the
/// stream banner.
pub fn probe_args(input: &Path) -> Vec<String> {
    vec!["-hide_banner".to_string(), "-i".to_string(), path_arg(input)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DitherMode;

    #[test]
    fn test_scale_filter() {
        assert_eq!(scale_filter(480), "scale='min(iw,480)':-2:flags=lanczos");
        assert_eq!(scale_filter(0), "scale=iw:ih:flags=lanczos");
    }

    #[test]
    fn test_palette_args() {
        let params = ConversionParameters {
            fps: 12,
            max_width: 480,
            max_colors: 128,
            ..Default::default()
        };
        let args = palette_args(Path::new("in.mp4"), Path::new("palette.png"), &params);
        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-i",
                "in.mp4",
                "-vf",
                "fps=12,scale='min(iw,480)':-2:flags=lanczos,palettegen=max_colors=128:stats_mode=diff",
                "palette.png",
            ]
        );
    }

    #[test]
    fn test_encode_args_without_resize() {
        let params = ConversionParameters {
            fps: 15,
            max_width: 0,
            max_colors: 256,
            dither: DitherMode::bayer(),
            loop_count: 2,
        };
        let args = encode_args(
            Path::new("in.mp4"),
            Path::new("palette.png"),
            Path::new("out.gif"),
            &params,
        );
        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-i",
                "in.mp4",
                "-i",
                "palette.png",
                "-lavfi",
                "[0:v]fps=15,scale=iw:ih:flags=lanczos[x];[x][1:v]paletteuse=dither=bayer:bayer_scale=2:diff_mode=rectangle",
                "-loop",
                "2",
                "out.gif",
            ]
        );
    }

    #[test]
    fn test_probe_args() {
        assert_eq!(probe_args(Path::new("a b.mp4")), vec!["-hide_banner", "-i", "a b.mp4"]);
    }
}
