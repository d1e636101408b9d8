// THEORY:
// `pattern_runner` is the executable front end. It parses the command line,
// builds a `PatternConfig` from a profile plus optional JSON overrides, picks
// a sensor device, and hands everything to `kinetic_patterns::run_app`.
//
// Two display modes exist. The default opens an OpenCV window. `--headless`
// renders into an in-memory canvas and writes the last frame to a PNG, which
// is how the engine is exercised on machines without a screen.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kinetic_patterns::core_modules::canvas::HeadlessDisplay;
use kinetic_patterns::synthetic::SyntheticDepthSensor;
use kinetic_patterns::{PatternConfig, SensorDevice, StopSignal, run_app};
use std::path::PathBuf;
use tracing::info;

mod sensor;
mod window;

use sensor::{OpenNiSensor, WebcamSensor};
use window::PatternWindow;

const WINDOW_NAME: &str = "Kinetic Patterns";
/// Frames rendered in headless mode when `--frames` is not given.
const DEFAULT_HEADLESS_FRAMES: u64 = 300;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    /// Desktop-class machine
    Standard,
    /// Single-board computer
    Constrained,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    /// Depth camera through OpenNI2
    Openni,
    /// Greyscale webcam used as a depth proxy
    Webcam,
    /// Built-in moving block
    Synthetic,
}

#[derive(Parser)]
#[command(name = "pattern_runner")]
#[command(about = "Turns depth-sensor motion into animated patterns")]
#[command(version)]
struct Cli {
    /// Built-in configuration profile
    #[arg(long, value_enum, default_value = "standard")]
    profile: Profile,

    /// JSON file whose fields override the profile
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where depth frames come from
    #[arg(short, long, value_enum, default_value = "openni")]
    source: Source,

    /// Capture device index
    #[arg(short, long, default_value = "0")]
    device: i32,

    /// Render without a window and write a PNG snapshot
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames
    #[arg(short, long)]
    frames: Option<u64>,

    /// Snapshot path used in headless mode
    #[arg(long, default_value = "snapshot.png")]
    snapshot: PathBuf,
}

fn main() -> Result<()> {
    // Set RUST_LOG to control the log level, e.g. RUST_LOG=kinetic_patterns=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let stop = StopSignal::new();
    install_stop_handler(&stop)?;

    let device = build_device(cli.source, cli.device, config.sensor_resolution);
    let (width, height) = config.resolution;

    if cli.headless {
        let frames = cli.frames.unwrap_or(DEFAULT_HEADLESS_FRAMES);
        let mut display = HeadlessDisplay::new(width, height)?;
        let report = run_app(config, device, &mut display, stop, Some(frames))?;
        display
            .canvas()
            .save_png(&cli.snapshot)
            .with_context(|| format!("writing snapshot to {}", cli.snapshot.display()))?;
        info!(
            frames = report.stats.frames_rendered,
            pattern = report.stats.final_pattern.name(),
            snapshot = %cli.snapshot.display(),
            "headless run finished"
        );
    } else {
        let mut window = PatternWindow::open(WINDOW_NAME, width, height)?;
        let report = run_app(config, device, &mut window, stop, cli.frames)?;
        info!(
            frames = report.stats.frames_rendered,
            switches = report.stats.pattern_switches,
            "window closed"
        );
    }

    Ok(())
}

/// Raises `stop` on SIGINT, SIGTERM and SIGHUP so the session guard still
/// releases the sensor and the window when a service manager stops us.
fn install_stop_handler(stop: &StopSignal) -> Result<()> {
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("termination signal received, stopping");
        handler_stop.raise();
    })
    .context("installing signal handler")
}

fn load_config(cli: &Cli) -> Result<PatternConfig> {
    let base = match cli.profile {
        Profile::Standard => PatternConfig::standard(),
        Profile::Constrained => PatternConfig::constrained(),
    };
    let config = match &cli.config {
        Some(path) => base
            .with_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => {
            base.validate()?;
            base
        }
    };
    info!(profile = ?cli.profile, ?config, "configuration loaded");
    Ok(config)
}

fn build_device(source: Source, index: i32, size: (u32, u32)) -> Box<dyn SensorDevice> {
    match source {
        Source::Openni => Box::new(OpenNiSensor::new(index, size)),
        Source::Webcam => Box::new(WebcamSensor::new(index, size)),
        Source::Synthetic => Box::new(SyntheticDepthSensor::new(size.0, size.1)),
    }
}
