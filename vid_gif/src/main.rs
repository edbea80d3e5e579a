use clap::{Args, Parser, Subcommand, ValueEnum};
use shared_utils::colors;
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::{
    create_percent_bar, create_professional_spinner, format_bytes_f64, format_seconds,
    fraction_to_percent, FileSize,
};
use std::path::PathBuf;
use tracing::{info, Level};

use vid_gif::params::{clamp_fps, DEFAULT_FPS, DEFAULT_MAX_WIDTH};
use vid_gif::{
    ColorPreset, ConversionParameters, DitherMode, EstimateReport, GifError, MediaMetadata,
    OptimizeOutcome, RunConfig, RunSummary,
};

#[derive(Parser)]
#[command(name = "vid-gif")]
#[command(version, about = "MP4 to GIF converter with size-aware auto-optimization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the ffmpeg binary (default: looked up on PATH)
    #[arg(long, global = true, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show duration and resolution
    Probe {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(long, default_value = "human")]
        output: OutputFormat,
    },

    /// Predict the GIF size for the given parameters
    Estimate {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        params: ParamArgs,

        #[arg(long, default_value = "human")]
        output: OutputFormat,
    },

    /// Search for parameters that fit the size budget
    Optimize {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(long = "loop", default_value_t = 0)]
        loop_count: u32,

        #[arg(long, default_value = "human")]
        output: OutputFormat,
    },

    /// Convert to GIF
    #[command(name = "run")]
    Run {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output .gif file or directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,

        /// Pick parameters with the auto-optimizer first
        #[arg(long)]
        auto: bool,

        /// Overwrite an existing output
        #[arg(short, long)]
        force: bool,

        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Args, Clone)]
struct ParamArgs {
    /// Frames per second (1-60)
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: u32,

    /// Maximum output width in pixels, 0 keeps the original
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
    max_width: u32,

    /// Palette size; rounded and clamped to 32-256
    #[arg(long, conflicts_with = "preset")]
    colors: Option<f64>,

    /// Palette preset: 256, 192, 128, 96 or 64
    #[arg(long)]
    preset: Option<ColorPreset>,

    /// none, bayer[:bayer_scale=N], floyd_steinberg, sierra2, sierra2_4a
    #[arg(long, default_value = "sierra2_4a")]
    dither: DitherMode,

    /// Loop count, 0 loops forever
    #[arg(long = "loop", default_value_t = 0)]
    loop_count: u32,
}

impl ParamArgs {
    fn to_params(&self) -> ConversionParameters {
        let mut params = ConversionParameters {
            fps: clamp_fps(self.fps),
            max_width: self.max_width,
            dither: self.dither,
            loop_count: self.loop_count,
            ..Default::default()
        };
        if let Some(colors) = self.colors {
            let preset = params.set_max_colors(colors);
            info!(colors = params.max_colors, preset = %preset, "Palette size");
        }
        if let Some(preset) = self.preset {
            params.apply_preset(preset);
        }
        params
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let _ = init_logging("vid_gif", LogConfig::default().with_level(level));

    let ffmpeg = cli.ffmpeg;
    let result = match cli.command {
        Commands::Probe { input, output } => {
            shared_utils::progress::set_quiet_mode(output == OutputFormat::Json);
            let spinner = create_professional_spinner("Probe");
            spinner.set_message(input.display().to_string());
            let meta = vid_gif::probe(&input, ffmpeg);
            spinner.finish_and_clear();
            meta.map(|meta| match output {
                OutputFormat::Human => print_metadata_human(&input, &meta),
                OutputFormat::Json => print_json(&meta),
            })
        }

        Commands::Estimate {
            input,
            params,
            output,
        } => vid_gif::estimate(&input, params.to_params(), ffmpeg).map(|report| match output {
            OutputFormat::Human => print_estimate_human(&report),
            OutputFormat::Json => print_json(&report),
        }),

        Commands::Optimize {
            input,
            loop_count,
            output,
        } => vid_gif::optimize(&input, loop_count, ffmpeg).map(|outcome| match output {
            OutputFormat::Human => print_optimize_human(&outcome),
            OutputFormat::Json => print_json(&outcome),
        }),

        Commands::Run {
            input,
            output,
            params,
            auto,
            force,
            format,
        } => {
            shared_utils::progress::set_quiet_mode(format == OutputFormat::Json);
            let config = RunConfig {
                params: params.to_params(),
                output,
                force,
                auto,
                ffmpeg,
                prefer_ffprobe: true,
            };

            info!("🎬 GIF Conversion");
            if auto {
                info!("   🎯 Auto-optimize: ENABLED");
            }

            let bar = create_percent_bar("GIF");
            let progress_bar = bar.clone();
            let result = vid_gif::run(
                &input,
                &config,
                Some(Box::new(move |fraction: f64| {
                    progress_bar.set_position(fraction_to_percent(fraction))
                })),
            );
            match &result {
                Ok(_) => bar.finish_and_clear(),
                Err(_) => bar.abandon(),
            }
            result.map(|summary| match format {
                OutputFormat::Human => print_run_human(&summary),
                OutputFormat::Json => print_json(&summary),
            })
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            report_error(&e);
            std::process::exit(1);
        }
    }
}

fn report_error(e: &GifError) {
    tracing::error!(error = %e, "vid-gif failed");
    eprintln!("{} {}", colors::error().apply_to("❌"), e.user_message());
    if !matches!(e, GifError::OutputExists(_)) {
        eprintln!("   {}", colors::dim().apply_to(e));
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("❌ JSON serialization failed: {}", e),
    }
}

fn print_metadata_human(input: &std::path::Path, meta: &MediaMetadata) {
    println!("\n📊 Input");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📁 File: {}", input.display());
    println!(
        "⏱️  Duration: {}",
        meta.duration_secs.map_or("—".to_string(), format_seconds)
    );
    match (meta.width, meta.height) {
        (Some(w), Some(h)) => println!("📐 Resolution: {}x{}", w, h),
        _ => println!("📐 Resolution: —"),
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

fn print_estimate_human(report: &EstimateReport) {
    println!(
        "📦 Estimated GIF size: {}",
        colors::info().apply_to(format_bytes_f64(report.bytes))
    );
    println!("   {}", colors::dim().apply_to(&report.hint));
}

fn print_params(params: &ConversionParameters) {
    println!("🎞️  FPS: {}", params.fps);
    if params.max_width == 0 {
        println!("📐 Max width: original");
    } else {
        println!("📐 Max width: {}px", params.max_width);
    }
    println!(
        "🎨 Colors: {} ({})",
        params.max_colors,
        params.color_preset()
    );
    println!("🌈 Dither: {}", params.dither);
    println!("🔁 Loop: {}", params.loop_count);
}

fn print_optimize_human(outcome: &OptimizeOutcome) {
    let c = &outcome.candidate;
    println!("\n🎯 Auto-optimize");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print_params(&c.params);
    println!();
    println!(
        "📦 Estimate: {} (target {})",
        colors::fmt_budget(&format_bytes_f64(c.estimated_bytes), outcome.within_budget()),
        FileSize::new(outcome.target_bytes)
    );
    println!("⭐ Quality score: {}/10", c.quality_score);
    println!("🔍 Candidates evaluated: {}", outcome.evaluated);
    if !outcome.within_budget() {
        println!(
            "{}",
            colors::warning().apply_to("⚠️  No candidate fits the target; using the smallest.")
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

fn print_run_human(summary: &RunSummary) {
    let report = &summary.report;
    if let Some(outcome) = &summary.optimize {
        print_optimize_human(outcome);
    }
    println!("\n{}", colors::success().apply_to("✅ Complete!"));
    println!("   Output: {}", report.output.display());
    print!("   Size: {}", report.output_size);
    if let Some(estimate) = &summary.estimate {
        print!(" (estimated {})", format_bytes_f64(estimate.bytes));
    }
    println!();
    if let Some(pct) = report.output_size.size_change_percent(report.input_size) {
        println!("   Change vs input: {}", colors::fmt_size_pct(pct));
    }
}
