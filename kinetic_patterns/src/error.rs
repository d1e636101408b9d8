//! Error types for the pattern engine.
//!
//! Sensor errors are recoverable by design of the reactive loop: they are logged
//! and downgraded to "no motion". Render errors are fatal and travel up to the
//! binary.

use thiserror::Error;

/// Failures raised by a depth sensor device.
#[derive(Error, Debug)]
pub enum SensorError {
    /// The device could not be opened or configured.
    #[error("sensor initialization failed: {0}")]
    InitializationFailed(String),

    /// The device stopped delivering frames.
    #[error("sensor disconnected: {0}")]
    Disconnected(String),

    /// A frame could not be read or converted.
    #[error("frame acquisition failed: {0}")]
    Acquisition(String),
}

/// Failures raised by the drawing surface or the window behind it.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The window or drawing surface could not be created.
    #[error("could not create a {width}x{height} surface: {reason}")]
    SurfaceCreation {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A draw call was rejected by the backend.
    #[error("draw call failed: {0}")]
    Draw(String),

    /// The finished frame could not be shown.
    #[error("present failed: {0}")]
    Present(String),
}

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("could not parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("could not read configuration file: {0}")]
    Io(#[from] std::io::Error),
}
