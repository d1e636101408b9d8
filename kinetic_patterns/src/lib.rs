// THEORY:
// This file is the entry point for the `kinetic_patterns` library crate. It
// turns a stream of depth frames into animated abstract patterns:
//
// - the sensor flow (`sensor_flow`) extracts a `MotionSignal` from every depth
//   frame on its own thread and publishes the newest one,
// - the render flow (`reactive_loop`) reads that signal once per frame, steers
//   the `PatternRenderer` with it and presents the result.
//
// `app::run_app` is the high-level entry point that wires both flows to a
// sensor device and a display. The drawing primitives and the pattern state
// machine live in `core_modules`; they know nothing about threads or windows.

pub mod app;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod reactive_loop;
pub mod sensor_flow;
pub mod synthetic;

pub use app::{AppReport, run_app};
pub use config::PatternConfig;
pub use core_modules::pattern_renderer::{PatternKind, PatternRenderer};
pub use core_modules::surface::{Color, Display, InputEvent, Surface};
pub use error::{ConfigError, RenderError, SensorError};
pub use sensor_flow::{FrameSink, SensorDevice, StopSignal};
