// THEORY:
// The stateless pattern painters. Each function draws one frame of one visual
// mode and is a pure function of its `PatternInput` (motion centroid in display
// space, normalized intensity, simulated time) plus the surface it draws on.
// The particle mode is the exception: it needs a persistent pool, so it lives
// with the `ParticleSimulator` and is driven by the renderer.
//
// Every painter returns the number of primitives it drew. Callers mostly
// ignore it; tests use it to check that off-screen shapes are skipped.

use crate::core_modules::particle::PALETTE;
use crate::core_modules::surface::{Color, Surface};
use crate::error::RenderError;
use std::f64::consts::PI;

/// What every painter sees for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternInput {
    /// Motion centroid in display pixels.
    pub centroid: (i32, i32),
    /// Normalized motion intensity in `[0, 1]`.
    pub intensity: f64,
    /// Simulated time accumulated by the renderer.
    pub time: f64,
}

const SPIRAL_STEP_DEGREES: usize = 5;
const SPIRAL_SPIN: f64 = 50.0;
const SPIRAL_DOT_RADIUS: i32 = 3;

const WAVE_PITCH: usize = 10;
const WAVE_CELL: u32 = 8;
const WAVE_THRESHOLD: f64 = 0.3;

const HEXAGON_BASE_COUNT: f64 = 5.0;
const HEXAGON_ORBIT: f64 = 100.0;
const HEXAGON_ORBIT_GROWTH: f64 = 200.0;
const HEXAGON_SIZE: f64 = 20.0;
const HEXAGON_SIZE_GROWTH: f64 = 30.0;

/// Dots along an Archimedean spiral centred on the motion.
pub fn draw_spiral<S: Surface>(input: &PatternInput, surface: &mut S) -> Result<usize, RenderError> {
    let (cx, cy) = (input.centroid.0 as f64, input.centroid.1 as f64);
    let warm = (255.0 * input.intensity) as u8;
    let color = Color::new(warm, 100, 255 - warm);
    let mut drawn = 0;

    for degrees in (0..360).step_by(SPIRAL_STEP_DEGREES) {
        let angle = (degrees as f64 + input.time * SPIRAL_SPIN).to_radians();
        let radius = (degrees / SPIRAL_STEP_DEGREES) as f64 * (1.0 + input.intensity);
        let x = cx + angle.cos() * radius;
        let y = cy + angle.sin() * radius;

        if surface.contains(x, y) {
            surface.fill_circle((x as i32, y as i32), SPIRAL_DOT_RADIUS, color)?;
            drawn += 1;
        }
    }
    Ok(drawn)
}

/// Interference of three sine waves sampled on a coarse grid.
pub fn draw_wave<S: Surface>(input: &PatternInput, surface: &mut S) -> Result<usize, RenderError> {
    let (cx, cy) = (input.centroid.0 as f64, input.centroid.1 as f64);
    let t = input.time;
    let mut drawn = 0;

    for x in (0..surface.width() as usize).step_by(WAVE_PITCH) {
        for y in (0..surface.height() as usize).step_by(WAVE_PITCH) {
            let (fx, fy) = (x as f64, y as f64);
            let distance = ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();

            let wave = (distance * 0.1 + t * 5.0).sin()
                + (fx * 0.05 + t * 3.0).sin()
                + (fy * 0.03 + t * 2.0).sin();
            let value = wave_value(wave, input.intensity);

            if value > WAVE_THRESHOLD {
                let level = (value * 255.0) as u8;
                let color = Color::new(level, level / 2, 255 - level);
                surface.fill_rect((x as i32, y as i32), (WAVE_CELL, WAVE_CELL), color)?;
                drawn += 1;
            }
        }
    }
    Ok(drawn)
}

/// Maps a sum of three sines from `[-3, 3]` into `[0, intensity]`.
fn wave_value(wave: f64, intensity: f64) -> f64 {
    (wave + 3.0) / 6.0 * intensity
}

/// Rotating hexagons orbiting the motion centroid.
pub fn draw_geometric<S: Surface>(
    input: &PatternInput,
    surface: &mut S,
) -> Result<usize, RenderError> {
    let (cx, cy) = (input.centroid.0 as f64, input.centroid.1 as f64);
    let count = hexagon_count(input.intensity);
    let orbit = HEXAGON_ORBIT + input.intensity * HEXAGON_ORBIT_GROWTH;
    let size = (HEXAGON_SIZE + input.intensity * HEXAGON_SIZE_GROWTH).floor();
    let mut drawn = 0;

    for index in 0..count {
        let angle = (index as f64 / count as f64) * 2.0 * PI + input.time;
        let x = cx + angle.cos() * orbit;
        let y = cy + angle.sin() * orbit;

        let fully_outside = x + size < 0.0
            || y + size < 0.0
            || x - size >= surface.width() as f64
            || y - size >= surface.height() as f64;
        if fully_outside {
            continue;
        }

        let vertices = hexagon(x, y, size, angle);
        surface.fill_polygon(&vertices, PALETTE[index % PALETTE.len()])?;
        drawn += 1;
    }
    Ok(drawn)
}

pub fn hexagon_count(intensity: f64) -> usize {
    (HEXAGON_BASE_COUNT + intensity * 10.0).floor() as usize
}

fn hexagon(x: f64, y: f64, size: f64, rotation: f64) -> [(f64, f64); 6] {
    std::array::from_fn(|vertex| {
        let angle = rotation + (vertex as f64 / 6.0) * 2.0 * PI;
        (x + angle.cos() * size, y + angle.sin() * size)
    })
}
