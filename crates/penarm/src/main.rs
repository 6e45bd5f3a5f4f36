//! penarm: trace an image with a robot arm.
//!
//! Extracts the edges of an image, orders them into a single pen tour and
//! then, depending on the flags:
//!
//! - replays the tour against a simulator bridge (`--simulator`) or an
//!   in-memory recorder (`--dry-run`),
//! - writes an ABB RAPID program for a real controller (`--rapid-module`),
//! - saves previews of the edge mask, the drawn result and an SVG.
//!
//! # Usage
//!
//! ```text
//! penarm [OPTIONS] <IMAGE_PATH>
//! penarm face.png --simulator 127.0.0.1:19999 --preview drawn.png
//! penarm face.png --rapid-module face --out-dir programs/
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use penarm_export::{RapidConfig, SvgOptions};
use penarm_pipeline::diagnostics::{SystemClock, plan_with_diagnostics};
use penarm_pipeline::{
    CandidateStrategy, DrawPlan, ExtractConfig, PipelineConfig, Point, ResizeFilter, TourConfig,
};
use penarm_playback::{
    Driver, MotionSink, PlaybackConfig, PlaybackReport, ProgressCanvas, RecordingSink, RemoteSink,
};

/// Trace an image with a robot arm.
///
/// Turns the edges of an image into one continuous pen tour, then plays
/// it back in a simulator and/or writes it out as an ABB RAPID program.
#[derive(Parser, Debug)]
#[command(name = "penarm", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Length in pixels of the larger image side after resizing.
    #[arg(long, default_value_t = ExtractConfig::DEFAULT_TARGET_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    size: u32,

    /// Resize filter.
    #[arg(long, value_enum, default_value_t = Filter::CatmullRom)]
    filter: Filter,

    /// Gaussian blur sigma before edge detection (0 disables).
    #[arg(long, default_value_t = ExtractConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Canny low threshold.
    #[arg(long, default_value_t = ExtractConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = ExtractConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Keep edge pixels in the first row and column.
    #[arg(long)]
    keep_border: bool,

    /// Candidate edge generation for the tour.
    #[arg(long, value_enum, default_value_t = Strategy::Auto)]
    strategy: Strategy,

    /// Maximum 2-opt passes after the greedy tour (0 disables).
    #[arg(long, default_value_t = TourConfig::DEFAULT_REFINE_PASSES)]
    refine_passes: usize,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, the extraction and tour flags above are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Longest tour step, in resized-image pixels, drawn with the pen down.
    #[arg(long, default_value_t = penarm_pipeline::DEFAULT_DRAW_THRESHOLD)]
    threshold: f64,

    /// Scale factor from image pixels to the drawing, in the simulator and
    /// in the RAPID program.
    #[arg(long, default_value_t = PlaybackConfig::DEFAULT_SCALE)]
    scale: f64,

    /// Height of the drawing surface in the simulator.
    #[arg(long, default_value_t = PlaybackConfig::DEFAULT_DRAW_HEIGHT)]
    draw_height: f64,

    /// Simulator object moved by playback.
    #[arg(long, default_value = PlaybackConfig::DEFAULT_TARGET_OBJECT)]
    target_object: String,

    /// Simulator object whose frame positions are relative to.
    #[arg(long, default_value = PlaybackConfig::DEFAULT_REFERENCE_FRAME)]
    reference_frame: String,

    /// Replay against the simulator bridge at this address (host:port).
    #[arg(long, conflicts_with = "dry_run")]
    simulator: Option<String>,

    /// Connection and per-command timeout for the simulator, in seconds.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Replay against an in-memory recorder instead of a simulator.
    #[arg(long)]
    dry_run: bool,

    /// Stop playback after this many segments.
    #[arg(long)]
    max_segments: Option<usize>,

    /// Write a RAPID program module with this name (`<name>.prg`).
    #[arg(long)]
    rapid_module: Option<String>,

    /// Name of the RAPID reference robtarget.
    #[arg(long, default_value = RapidConfig::DEFAULT_REFERENCE_POINT)]
    reference_point: String,

    /// Name of the RAPID tooldata.
    #[arg(long, default_value = RapidConfig::DEFAULT_TOOL_NAME)]
    tool: String,

    /// Speed of RAPID drawing moves.
    #[arg(long, default_value_t = RapidConfig::DEFAULT_VELOCITY)]
    velocity: u32,

    /// Pen-down threshold of the RAPID program, in halved image pixels.
    #[arg(long, default_value_t = 3.0)]
    rapid_factor: f64,

    /// Directory the RAPID program is written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Save the played-back drawing as an image.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Save the edge mask as an image.
    #[arg(long)]
    edges: Option<PathBuf>,

    /// Save the tour as an SVG file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Print pipeline diagnostics as JSON instead of a report.
    #[arg(long)]
    json: bool,

    /// More log output (-v info, -vv debug, -vvv trace). `RUST_LOG` wins.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Resize filter selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Filter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<Filter> for ResizeFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Tour candidate strategy selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// Full matrix for small inputs, nearest neighbours for large ones.
    Auto,
    /// Every pair of points.
    Matrix,
    /// k nearest neighbours per point.
    Nearest,
}

impl From<Strategy> for CandidateStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Auto => Self::Auto,
            Strategy::Matrix => Self::Matrix,
            Strategy::Nearest => Self::Nearest,
        }
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// `--config-json` replaces the individual extraction and tour flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("cannot parse --config-json: {e}"));
    }

    Ok(PipelineConfig {
        extract: ExtractConfig {
            target_size: cli.size,
            resize_filter: cli.filter.into(),
            blur_sigma: cli.blur_sigma,
            canny_low: cli.canny_low,
            canny_high: cli.canny_high,
            exclude_border: !cli.keep_border,
        },
        tour: TourConfig {
            strategy: cli.strategy.into(),
            refine_passes: cli.refine_passes,
            ..TourConfig::default()
        },
    })
}

fn playback_from_cli(cli: &Cli) -> PlaybackConfig {
    PlaybackConfig {
        scale: cli.scale,
        draw_height: cli.draw_height,
        draw_threshold: cli.threshold,
        target_object: cli.target_object.clone(),
        reference_frame: cli.reference_frame.clone(),
        ..PlaybackConfig::default()
    }
}

fn rapid_from_cli(cli: &Cli, module_name: &str) -> RapidConfig {
    RapidConfig {
        module_name: module_name.to_owned(),
        reference_point: cli.reference_point.clone(),
        tool_name: cli.tool.clone(),
        velocity: cli.velocity,
        // Points are scaled before export; scale the threshold with them so
        // pen-down steps match playback.
        draw_threshold: RapidConfig::DEFAULT_DRAW_THRESHOLD * cli.rapid_factor * cli.scale,
        ..RapidConfig::default()
    }
}

/// Tour points in drawing units, or `None` if there is no path to export.
fn rapid_points(plan: &DrawPlan, scale: f64) -> Option<Vec<Point>> {
    (plan.tour.len() >= 2).then(|| {
        plan.ordered_points()
            .into_iter()
            .map(|p| p.scaled(scale))
            .collect()
    })
}

/// Write the RAPID program if one was requested.
///
/// A tour with nothing to draw is skipped with a warning so playback
/// still runs.
fn export_rapid(cli: &Cli, plan: &DrawPlan) -> Result<Option<PathBuf>, String> {
    let Some(ref module) = cli.rapid_module else {
        return Ok(None);
    };
    let Some(points) = rapid_points(plan, cli.scale) else {
        log::warn!("tour has fewer than two points; not writing RAPID module {module}");
        return Ok(None);
    };
    let rapid = rapid_from_cli(cli, module);
    penarm_export::write_rapid_program(&cli.out_dir, &points, &rapid)
        .map(Some)
        .map_err(|e| e.to_string())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, String> {
    let config = config_from_cli(cli)?;
    let playback = playback_from_cli(cli);
    playback.validate().map_err(|e| e.to_string())?;

    let image_bytes = std::fs::read(&cli.image_path)
        .map_err(|e| format!("cannot read {}: {e}", cli.image_path.display()))?;
    log::info!(
        "image {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len()
    );
    log::debug!("config: {config:?}");

    let (staged, diagnostics) = plan_with_diagnostics(&image_bytes, &config, &SystemClock::new())
        .map_err(|e| format!("pipeline failed: {e}"))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&diagnostics)
            .map_err(|e| format!("cannot serialize diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", diagnostics.report());
    }

    if let Some(ref path) = cli.edges {
        match staged.edges.save(path) {
            Ok(()) => eprintln!("Edge mask written to {}", path.display()),
            Err(e) => log::warn!("cannot write edge mask to {}: {e}", path.display()),
        }
    }

    let plan = &staged.plan;
    if let Some(ref path) = cli.svg {
        write_svg(cli, &config, plan, path);
    }

    if let Some(written) = export_rapid(cli, plan)? {
        eprintln!("RAPID program written to {}", written.display());
    }

    let report = if let Some(ref addr) = cli.simulator {
        let sink = RemoteSink::connect(addr.as_str(), Duration::from_secs(cli.timeout))
            .map_err(|e| format!("cannot reach simulator at {addr}: {e}"))?;
        Some(replay(cli, sink, playback, plan)?)
    } else if cli.dry_run || cli.preview.is_some() {
        let sink = RecordingSink::with_objects([
            playback.target_object.as_str(),
            playback.reference_frame.as_str(),
        ]);
        Some(replay(cli, sink, playback.without_delays(), plan)?)
    } else {
        None
    };

    match report {
        Some(report) if !report.is_clean() => {
            eprintln!(
                "error: {} of {} moves failed",
                report.failures.len(),
                report.waypoints
            );
            Ok(ExitCode::FAILURE)
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

/// Replay `plan` against `sink`, saving the preview if requested.
fn replay<S: MotionSink>(
    cli: &Cli,
    sink: S,
    config: PlaybackConfig,
    plan: &DrawPlan,
) -> Result<PlaybackReport, String> {
    let canvas = match cli.preview {
        Some(_) => {
            let canvas = ProgressCanvas::new(plan.dimensions, config.scale);
            if canvas.is_none() {
                log::warn!("preview of {:?} at scale {} is too large", plan.dimensions, config.scale);
            }
            canvas
        }
        None => None,
    };

    let mut driver = Driver::new(sink, config).map_err(|e| e.to_string())?;
    if let Some(canvas) = canvas {
        driver = driver.with_canvas(canvas);
    }

    let limit = cli.max_segments.unwrap_or(usize::MAX);
    let report = driver
        .replay_until(plan, |segment| {
            if segment.index < limit {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        })
        .map_err(|e| e.to_string())?;

    eprintln!(
        "Played {} segments ({} draws, {} jumps, {} moves{})",
        report.segments,
        report.draws,
        report.jumps,
        report.waypoints,
        if report.stopped_early { ", stopped early" } else { "" },
    );

    if let (Some(path), Some(canvas)) = (&cli.preview, driver.canvas()) {
        match canvas.to_image().save(path) {
            Ok(()) => eprintln!("Preview written to {}", path.display()),
            Err(e) => log::warn!("cannot write preview to {}: {e}", path.display()),
        }
    }

    Ok(report)
}

fn write_svg(cli: &Cli, config: &PipelineConfig, plan: &DrawPlan, path: &Path) {
    let title = cli
        .image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("penarm");
    let config_json = serde_json::to_string(config).ok();
    let options = SvgOptions {
        title: Some(title),
        config_json: config_json.as_deref(),
        show_jumps: true,
        ..SvgOptions::default()
    };
    let svg = penarm_export::to_svg(plan, cli.threshold, &options);
    match std::fs::write(path, &svg) {
        Ok(()) => eprintln!("SVG written to {} ({} bytes)", path.display(), svg.len()),
        Err(e) => log::warn!("cannot write SVG to {}: {e}", path.display()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("penarm").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_library_defaults() {
        let cli = parse(&["face.png"]);
        assert_eq!(config_from_cli(&cli).unwrap(), PipelineConfig::default());
        assert_eq!(playback_from_cli(&cli), PlaybackConfig::default());
    }

    #[test]
    fn flags_reach_the_configs() {
        let cli = parse(&[
            "face.png",
            "--size",
            "200",
            "--strategy",
            "nearest",
            "--refine-passes",
            "0",
            "--keep-border",
            "--scale",
            "2.5",
            "--threshold",
            "3",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.extract.target_size, 200);
        assert!(!config.extract.exclude_border);
        assert_eq!(config.tour.strategy, CandidateStrategy::Nearest);
        assert_eq!(config.tour.refine_passes, 0);

        let playback = playback_from_cli(&cli);
        assert!((playback.scale - 2.5).abs() < f64::EPSILON);
        assert!((playback.draw_threshold - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "face.png",
            "--size",
            "200",
            "--config-json",
            r#"{"extract":{"target_size":64}}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.extract.target_size, 64);
        assert_eq!(config.tour, TourConfig::default());
    }

    #[test]
    fn bad_config_json_is_an_error() {
        let cli = parse(&["face.png", "--config-json", "{"]);
        assert!(config_from_cli(&cli).unwrap_err().starts_with("cannot parse --config-json"));
    }

    #[test]
    fn rapid_factor_scales_threshold() {
        let cli = parse(&["face.png", "--tool", "Pen", "--velocity", "50"]);
        let rapid = rapid_from_cli(&cli, "face");
        assert_eq!(rapid.module_name, "face");
        assert_eq!(rapid.tool_name, "Pen");
        assert_eq!(rapid.velocity, 50);
        assert!((rapid.draw_threshold - 3.0).abs() < f64::EPSILON);
        assert_eq!(rapid.reference_point, "P1");
    }

    #[test]
    fn rapid_threshold_follows_scale() {
        let cli = parse(&["face.png", "--scale", "2.5"]);
        let rapid = rapid_from_cli(&cli, "face");
        assert!((rapid.draw_threshold - 7.5).abs() < 1e-12);
    }

    fn line_plan(xs: &[f64]) -> DrawPlan {
        DrawPlan {
            points: xs.iter().map(|&x| Point::new(x, 1.0)).collect(),
            tour: penarm_pipeline::Tour::new((0..xs.len()).rev().collect()),
            dimensions: penarm_pipeline::Dimensions {
                width: 10,
                height: 2,
            },
        }
    }

    #[test]
    fn rapid_points_are_scaled_in_tour_order() {
        let points = rapid_points(&line_plan(&[0.0, 1.0, 4.0]), 2.0).unwrap();
        assert_eq!(
            points,
            vec![Point::new(8.0, 2.0), Point::new(2.0, 2.0), Point::new(0.0, 2.0)]
        );
        assert!(rapid_points(&line_plan(&[3.0]), 2.0).is_none());
        assert!(rapid_points(&line_plan(&[]), 2.0).is_none());
    }

    #[test]
    fn rapid_program_uses_scaled_points() {
        let dir = std::env::temp_dir().join(format!("penarm-cli-{}-scaled", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out_dir = dir.to_str().unwrap();
        let cli = parse(&["face.png", "--rapid-module", "face", "--scale", "3", "--out-dir", out_dir]);
        let plan = line_plan(&[0.0, 1.0, 4.0]);

        let written = export_rapid(&cli, &plan).unwrap().unwrap();
        let program = std::fs::read_to_string(&written).unwrap();
        let expected = penarm_export::to_rapid(
            &rapid_points(&plan, 3.0).unwrap(),
            &rapid_from_cli(&cli, "face"),
        )
        .unwrap();
        assert_eq!(program, expected);
        let unscaled = penarm_export::to_rapid(
            &plan.ordered_points(),
            &rapid_from_cli(&cli, "face"),
        )
        .unwrap();
        assert_ne!(program, unscaled);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_tour_skips_rapid_without_failing() {
        let dir = std::env::temp_dir().join(format!("penarm-cli-{}-empty", std::process::id()));
        let out_dir = dir.to_str().unwrap();
        let cli = parse(&["face.png", "--rapid-module", "face", "--out-dir", out_dir]);

        assert_eq!(export_rapid(&cli, &line_plan(&[])).unwrap(), None);
        assert_eq!(export_rapid(&cli, &line_plan(&[2.0])).unwrap(), None);
        assert!(!dir.join("face.prg").exists());
    }

    #[test]
    fn no_rapid_module_writes_nothing() {
        let cli = parse(&["face.png"]);
        assert_eq!(export_rapid(&cli, &line_plan(&[0.0, 1.0])).unwrap(), None);
    }

    #[test]
    fn simulator_and_dry_run_conflict() {
        let result = Cli::try_parse_from(["penarm", "a.png", "--dry-run", "--simulator", "x:1"]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(Cli::try_parse_from(["penarm", "a.png", "--size", "0"]).is_err());
    }
}
