//! board-calib CLI: per-frame board analysis and arm calibration.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use board_calib::arm::{GradientDescent, KinematicCalibrator, LossMode, SampleTable};
use board_calib::detect;
use board_calib::frame::{FrameAnalysis, FrameConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use serde::Serialize;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "board-calib")]
#[command(about = "Board pose, occlusion polygons and arm calibration for the chess robot")]
#[command(version)]
struct Cli {
    /// Logger verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Emit JSON log lines (only with the `tracing` feature).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the board pose in one frame and write the 64 occlusion polygons.
    Frame(FrameArgs),

    /// Fit the arm's angle and translation offsets.
    Arm(ArmArgs),
}

#[derive(Debug, Clone, Args)]
struct FrameArgs {
    /// Input frame (any format the `image` crate reads).
    #[arg(long)]
    image: PathBuf,

    /// Pipeline configuration (JSON); defaults to the deployed camera and board.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the JSON report; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ArmArgs {
    /// Sample table (JSON array); the built-in reference table when omitted.
    #[arg(long)]
    samples: Option<PathBuf>,

    /// Ignore the height channel and hold tz at zero.
    #[arg(long)]
    planar: bool,

    #[arg(long, default_value_t = GradientDescent::default().iterations)]
    iterations: usize,

    #[arg(long, default_value_t = GradientDescent::default().step_size)]
    step: f64,

    #[arg(long, default_value_t = GradientDescent::default().momentum)]
    momentum: f64,

    /// Print the fitted parameters as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Per-frame report: the analysis on success, the error message otherwise.
#[derive(Serialize)]
struct FrameReport {
    image: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<FrameAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[cfg(feature = "tracing")]
fn init_logging(level: LevelFilter, json: bool) -> CliResult<()> {
    board_calib::core::init_tracing(json, level);
    // no-op when the subscriber already bridged `log`
    let _ = tracing_log::LogTracer::init();
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter, _json: bool) -> CliResult<()> {
    board_calib::core::init_with_level(level)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_level.into(), cli.log_json) {
        eprintln!("error: cannot initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Frame(args) => run_frame(&args),
        Commands::Arm(args) => run_arm(&args),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn write_output(path: Option<&Path>, json: &str) -> CliResult<()> {
    match path {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Exits with failure when no pose is found, after writing the report.
fn run_frame(args: &FrameArgs) -> CliResult<ExitCode> {
    let config = match &args.config {
        Some(path) => FrameConfig::load_json(path)?,
        None => FrameConfig::default(),
    };
    let frame = detect::load_frame(&args.image)?;
    info!(
        "loaded {} ({}x{})",
        args.image.display(),
        frame.width(),
        frame.height()
    );

    let analyzer = config.build_analyzer();
    let (report, code) = match detect::analyze_frame(&frame, &analyzer) {
        Ok(analysis) => {
            info!(
                "pose from markers {:?}, rms {:.3}px, {} squares visible",
                analysis.estimate.marker_ids,
                analysis.estimate.rms_px,
                analysis.visible_squares()
            );
            let report = FrameReport {
                image: args.image.clone(),
                analysis: Some(analysis),
                error: None,
            };
            (report, ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e}");
            let report = FrameReport {
                image: args.image.clone(),
                analysis: None,
                error: Some(e.to_string()),
            };
            (report, ExitCode::FAILURE)
        }
    };

    let json = serde_json::to_string_pretty(&report)?;
    write_output(args.output.as_deref(), &json)?;
    Ok(code)
}

fn run_arm(args: &ArmArgs) -> CliResult<ExitCode> {
    let table = match &args.samples {
        Some(path) => SampleTable::load_json(path)?,
        None => SampleTable::reference(),
    };
    let optimizer = GradientDescent::new(args.iterations, args.step, args.momentum);
    let mut calibrator = KinematicCalibrator::new(Default::default(), optimizer);
    if args.planar {
        calibrator = calibrator.with_mode(LossMode::Planar);
    }

    let params = calibrator.fit(table.samples())?;
    let loss = calibrator.loss(&params, table.samples());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&params)?);
    } else {
        println!("{params}");
        println!("loss {loss:.6e} over {} samples", table.len());
    }
    Ok(ExitCode::SUCCESS)
}
