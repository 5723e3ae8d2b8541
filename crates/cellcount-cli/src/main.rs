//! cellcount: count cells and nuclei in a microscopy image.
//!
//! Runs either segmentation path on an image file and prints the count and
//! area statistics. Optionally writes the overlay as PNG, the component
//! table as CSV, and per-stage diagnostics.
//!
//! # Usage
//!
//! ```text
//! cellcount watershed [OPTIONS] <IMAGE_PATH>
//! cellcount direct [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Logging goes to stderr. `RUST_LOG` takes precedence over `-v`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use cellcount_pipeline::diagnostics::Clock;
use cellcount_pipeline::{
    ChannelSelect, ComponentRecord, DirectConfig, DynamicImage, Point, WatershedConfig, roi,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Count cells and nuclei in microscopy images.
#[derive(Parser)]
#[command(name = "cellcount", version)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split touching objects with a seeded watershed.
    Watershed(WatershedArgs),
    /// Count well separated objects with a fixed threshold.
    Direct(DirectArgs),
}

/// Input image and optional region of interest.
#[derive(Args)]
struct Input {
    /// Path to the input image (PNG, JPEG, BMP, TIFF).
    image_path: PathBuf,

    /// Start curve of the region of interest as `x,y x,y ...`.
    #[arg(long, value_parser = parse_curve, requires = "roi_stop")]
    roi_start: Option<Curve>,

    /// Stop curve of the region of interest as `x,y x,y ...`.
    #[arg(long, value_parser = parse_curve, requires = "roi_start")]
    roi_stop: Option<Curve>,
}

/// Output destinations shared by both paths.
#[derive(Args)]
struct Output {
    /// Write the overlay image as PNG.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Write the kept component table as CSV.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print results as JSON instead of a text summary.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct WatershedArgs {
    #[command(flatten)]
    input: Input,

    /// Channel analyzed in RGB images (0 = R, 1 = G, 2 = B).
    #[arg(long, default_value_t = WatershedConfig::DEFAULT_CHANNEL, value_parser = clap::value_parser!(u8).range(0..=2))]
    channel: u8,

    /// Smallest kept region area in pixels (inclusive).
    #[arg(long, default_value_t = WatershedConfig::DEFAULT_MIN_AREA)]
    min_area: u64,

    /// Largest kept region area in pixels (inclusive).
    #[arg(long, default_value_t = WatershedConfig::DEFAULT_MAX_AREA)]
    max_area: u64,

    /// Gaussian blur kernel size (even sizes round up).
    #[arg(long, default_value_t = WatershedConfig::DEFAULT_BLUR_KERNEL)]
    blur_kernel: u32,

    /// Local-maximum window size for seed detection.
    #[arg(long, default_value_t = WatershedConfig::DEFAULT_MAXIMA_KERNEL)]
    maxima_kernel: u32,

    /// Seed threshold as a fraction of the largest distance value.
    #[arg(long, default_value_t = WatershedConfig::DEFAULT_PEAK_THRESH_FRAC)]
    peak_thresh_frac: f64,

    /// Dilation steps for the sure-background band.
    #[arg(long, default_value_t = WatershedConfig::DEFAULT_DILATE_ITERS)]
    dilate_iters: u8,

    /// Do not add seeds to components that have none.
    #[arg(long)]
    no_seed_supplement: bool,

    /// Full watershed config as a JSON string.
    ///
    /// When provided, all other parameter flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Print per-stage timing and counts.
    #[arg(long)]
    diagnostics: bool,

    #[command(flatten)]
    output: Output,
}

#[derive(Args)]
struct DirectArgs {
    #[command(flatten)]
    input: Input,

    /// How RGB images are reduced to one plane.
    #[arg(long, value_enum, default_value_t = Channel::Luminance)]
    channel: Channel,

    /// Stretch intensities to the full 0-255 range before thresholding.
    #[arg(long)]
    normalize: bool,

    /// Gaussian blur kernel size (even sizes round up).
    #[arg(long, default_value_t = DirectConfig::DEFAULT_BLUR_KERNEL)]
    blur_kernel: u32,

    /// Foreground is every pixel above this value.
    #[arg(long, default_value_t = DirectConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Smallest kept component area in pixels (inclusive).
    #[arg(long, default_value_t = DirectConfig::DEFAULT_MIN_AREA)]
    min_area: u64,

    /// Largest kept component area in pixels (inclusive).
    #[arg(long, default_value_t = DirectConfig::DEFAULT_MAX_AREA)]
    max_area: u64,

    /// Full direct config as a JSON string.
    ///
    /// When provided, all other parameter flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    #[command(flatten)]
    output: Output,
}

/// Channel reduction selection.
#[derive(Clone, Copy, ValueEnum)]
enum Channel {
    /// Weighted luminance of R, G and B.
    Luminance,
    Red,
    Green,
    Blue,
}

impl From<Channel> for ChannelSelect {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Luminance => Self::Luminance,
            Channel::Red => Self::Index(0),
            Channel::Green => Self::Index(1),
            Channel::Blue => Self::Index(2),
        }
    }
}

/// A traced curve in image coordinates.
#[derive(Clone, Debug)]
struct Curve(Vec<Point>);

/// Parse `x,y x,y ...` into a curve.
fn parse_curve(s: &str) -> Result<Curve, String> {
    s.split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("expected x,y but got {pair:?}"))?;
            let x: f64 = x.parse().map_err(|e| format!("bad x in {pair:?}: {e}"))?;
            let y: f64 = y.parse().map_err(|e| format!("bad y in {pair:?}: {e}"))?;
            Ok(Point::new(x, y))
        })
        .collect::<Result<Vec<_>, String>>()
        .map(Curve)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
    {
        eprintln!("Logger initialization failed: {e}");
    }
}

/// Build a [`WatershedConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn watershed_config(args: &WatershedArgs) -> Result<WatershedConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(WatershedConfig {
        channel: args.channel,
        min_area: args.min_area,
        max_area: args.max_area,
        blur_kernel: args.blur_kernel,
        maxima_kernel: args.maxima_kernel,
        peak_thresh_frac: args.peak_thresh_frac,
        dilate_iters: args.dilate_iters,
        seed_supplement: !args.no_seed_supplement,
    })
}

/// Build a [`DirectConfig`] from CLI arguments.
fn direct_config(args: &DirectArgs) -> Result<DirectConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(DirectConfig {
        channel: args.channel.into(),
        normalize: args.normalize,
        blur_kernel: args.blur_kernel,
        threshold: args.threshold,
        min_area: args.min_area,
        max_area: args.max_area,
    })
}

/// Read, decode and optionally mask the input image.
fn load_image(input: &Input) -> Result<DynamicImage, String> {
    let bytes = std::fs::read(&input.image_path)
        .map_err(|e| format!("Error reading {}: {e}", input.image_path.display()))?;
    tracing::debug!(path = %input.image_path.display(), bytes = bytes.len(), "read image");

    let image = cellcount_pipeline::decode::decode(&bytes)
        .map(cellcount_pipeline::decode::strip_alpha)
        .map_err(|e| format!("Error decoding {}: {e}", input.image_path.display()))?;

    let (Some(start), Some(stop)) = (&input.roi_start, &input.roi_stop) else {
        return Ok(image);
    };
    let polygon = roi::polygon_from_curves(&start.0, &stop.0);
    let dimensions = cellcount_pipeline::Dimensions {
        width: image.width(),
        height: image.height(),
    };
    let mask = roi::polygon_mask(dimensions, &polygon).map_err(|e| format!("Region of interest: {e}"))?;
    tracing::debug!(vertices = polygon.len(), "applying region of interest");
    roi::apply_mask(&image, &mask).map_err(|e| format!("Region of interest: {e}"))
}

fn write_file(path: &Path, bytes: &[u8], what: &str) -> Result<(), String> {
    std::fs::write(path, bytes)
        .map_err(|e| format!("Error writing {what} to {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "{what} written");
    Ok(())
}

/// Write the CSV table and the encoded overlay where requested.
fn write_outputs(
    output: &Output,
    components: &[ComponentRecord],
    encode_overlay: impl FnOnce() -> Result<Vec<u8>, cellcount_export::ExportError>,
) -> Result<(), String> {
    if let Some(ref path) = output.csv {
        write_file(path, cellcount_export::to_csv(components).as_bytes(), "CSV")?;
    }
    if let Some(ref path) = output.overlay {
        let png = encode_overlay().map_err(|e| e.to_string())?;
        write_file(path, &png, "overlay")?;
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Error serializing results: {e}"))?;
    println!("{json}");
    Ok(())
}

fn run_watershed(args: &WatershedArgs) -> Result<(), String> {
    let config = watershed_config(args)?;
    let image = load_image(&args.input)?;

    let (result, diagnostics) = if args.diagnostics {
        let (result, diagnostics) =
            cellcount_pipeline::diagnostics::process_with_diagnostics(&image, &config, &StdClock)
                .map_err(|e| format!("Pipeline error: {e}"))?;
        (result, Some(diagnostics))
    } else {
        let result = cellcount_pipeline::watershed_count(&image, &config)
            .map_err(|e| format!("Pipeline error: {e}"))?;
        (result, None)
    };

    write_outputs(&args.output, &result.kept, || {
        cellcount_export::encode_rgb_png(&result.overlay)
    })?;

    if args.output.json {
        return print_json(&serde_json::json!({
            "count": result.count,
            "otsu_threshold": result.debug.otsu_threshold,
            "components": result.kept,
            "stats": result.stats,
            "diagnostics": diagnostics,
        }));
    }

    print!("{}", cellcount_export::to_summary(&result.stats));
    if let Some(diagnostics) = diagnostics {
        println!();
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn run_direct(args: &DirectArgs) -> Result<(), String> {
    let config = direct_config(args)?;
    let image = load_image(&args.input)?;
    let result = cellcount_pipeline::direct_segment(&image, &config)
        .map_err(|e| format!("Pipeline error: {e}"))?;

    write_outputs(&args.output, &result.components, || {
        cellcount_export::encode_gray_png(&result.overlay)
    })?;

    if args.output.json {
        return print_json(&serde_json::json!({
            "count": result.components.len(),
            "components": result.components,
            "stats": result.stats,
        }));
    }

    print!("{}", cellcount_export::to_summary(&result.stats));
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match &cli.command {
        Command::Watershed(args) => run_watershed(args),
        Command::Direct(args) => run_direct(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn curve_parses_pairs() {
        let curve = parse_curve("0,0 10.5,3  20,-1").unwrap();
        assert_eq!(
            curve.0,
            vec![Point::new(0.0, 0.0), Point::new(10.5, 3.0), Point::new(20.0, -1.0)]
        );
        assert!(parse_curve("1;2").is_err());
        assert!(parse_curve("a,2").is_err());
    }

    #[test]
    fn flags_build_watershed_config() {
        let cli = Cli::try_parse_from([
            "cellcount",
            "watershed",
            "cells.png",
            "--min-area",
            "10",
            "--no-seed-supplement",
        ])
        .unwrap();
        let Command::Watershed(args) = cli.command else {
            unreachable!("parsed the watershed subcommand");
        };
        let config = watershed_config(&args).unwrap();
        assert_eq!(config.min_area, 10);
        assert!(!config.seed_supplement);
        assert_eq!(config.max_area, WatershedConfig::DEFAULT_MAX_AREA);
    }

    #[test]
    fn config_json_overrides_flags() {
        let json = serde_json::to_string(&DirectConfig {
            threshold: 99,
            ..DirectConfig::default()
        })
        .unwrap();
        let cli = Cli::try_parse_from([
            "cellcount",
            "direct",
            "cells.png",
            "--threshold",
            "10",
            "--config-json",
            &json,
        ])
        .unwrap();
        let Command::Direct(args) = cli.command else {
            unreachable!("parsed the direct subcommand");
        };
        assert_eq!(direct_config(&args).unwrap().threshold, 99);
    }

    #[test]
    fn channel_out_of_range_is_rejected() {
        let parsed = Cli::try_parse_from(["cellcount", "watershed", "x.png", "--channel", "3"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn roi_curves_must_come_in_pairs() {
        let parsed = Cli::try_parse_from(["cellcount", "direct", "x.png", "--roi-start", "0,0 5,0"]);
        assert!(parsed.is_err());
    }
}
