// THEORY:
// `PatternConfig` is the single static option set for the whole engine. Every
// tunable number the pattern engine uses lives here so that the empirically
// chosen constants (switch threshold, spawn scale, intensity divisor) stay
// visible and adjustable instead of being buried in the drawing code.
//
// Two profiles ship with the crate: `standard` for a desktop-class machine and
// `constrained` for a single-board computer, which trades display size,
// particle count, frame rate and depth resolution for headroom.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the reactive pattern engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Display surface size in pixels.
    pub resolution: (u32, u32),
    /// Native depth frame size delivered by the sensor.
    pub sensor_resolution: (u32, u32),
    /// Hard cap on live particles.
    pub max_particles: usize,
    /// Target rendered frames per second.
    pub fps_target: u32,
    /// Spatial stride used when differencing depth frames. 1 keeps every pixel.
    pub depth_sample_rate: u32,
    /// Number of recent motion signals averaged by the loop. 1 disables smoothing.
    pub motion_smoothing: usize,
    /// Per-pixel depth difference that counts as movement.
    pub movement_threshold: u8,
    /// Raw intensity that maps to a normalized intensity of 1.0.
    pub intensity_divisor: f64,
    /// Normalized intensity above which the renderer advances on its own.
    pub auto_switch_threshold: f64,
    /// Normalized intensity above which particles are spawned.
    pub spawn_threshold: f64,
    /// Particles spawned per unit of normalized intensity.
    pub spawn_per_intensity: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl PatternConfig {
    pub fn standard() -> Self {
        Self {
            resolution: (800, 600),
            sensor_resolution: (640, 480),
            max_particles: 100,
            fps_target: 60,
            depth_sample_rate: 1,
            motion_smoothing: 1,
            movement_threshold: 30,
            intensity_divisor: 10_000.0,
            auto_switch_threshold: 0.8,
            spawn_threshold: 0.1,
            spawn_per_intensity: 10.0,
        }
    }

    /// Profile for a single-board computer driving a small local display.
    pub fn constrained() -> Self {
        Self {
            resolution: (640, 480),
            max_particles: 50,
            fps_target: 30,
            depth_sample_rate: 2,
            motion_smoothing: 3,
            ..Self::standard()
        }
    }

    /// Looks up a built-in profile by name.
    pub fn profile(name: &str) -> Result<Self, ConfigError> {
        match name {
            "standard" => Ok(Self::standard()),
            "constrained" => Ok(Self::constrained()),
            other => Err(ConfigError::Invalid(format!("unknown profile `{other}`"))),
        }
    }

    /// Parses a JSON object of overrides on top of the standard profile.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::standard().with_json_overrides(json)
    }

    /// Applies the fields present in a JSON object on top of `self`.
    pub fn with_json_overrides(&self, json: &str) -> Result<Self, ConfigError> {
        let overrides: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(overrides) = overrides else {
            return Err(ConfigError::Invalid(
                "configuration must be a JSON object".to_string(),
            ));
        };

        let mut merged = serde_json::to_value(self)?;
        if let serde_json::Value::Object(fields) = &mut merged {
            for (key, value) in overrides {
                fields.insert(key, value);
            }
        }

        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_json_file(&self, path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        self.with_json_overrides(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = self.resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!(
                "display resolution {width}x{height} must be non-zero"
            )));
        }
        let (sensor_width, sensor_height) = self.sensor_resolution;
        if sensor_width == 0 || sensor_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "sensor resolution {sensor_width}x{sensor_height} must be non-zero"
            )));
        }
        if self.fps_target == 0 {
            return Err(ConfigError::Invalid("fps_target must be at least 1".to_string()));
        }
        if self.depth_sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "depth_sample_rate must be at least 1".to_string(),
            ));
        }
        if self.motion_smoothing == 0 {
            return Err(ConfigError::Invalid(
                "motion_smoothing must be at least 1".to_string(),
            ));
        }
        if !(self.intensity_divisor > 0.0) {
            return Err(ConfigError::Invalid(
                "intensity_divisor must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The frame budget derived from `fps_target`.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps_target.max(1) as f64)
    }
}
