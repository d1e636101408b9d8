// THEORY:
// The `PatternRenderer` is a four-state machine over the visual modes:
//
//     Spiral -> Wave -> ParticleSystem -> Geometric -> Spiral -> ...
//
// There is no terminal state. The machine advances on an explicit "next
// pattern" request, and on its own whenever the normalized motion intensity is
// above the auto-switch threshold at the end of a rendered frame. That check
// runs once per frame, so sustained strong motion walks through the modes one
// per frame.
//
// Each frame the renderer:
// 1.  advances its simulated clock by a fixed 1/60 (never wall-clock time),
// 2.  darkens the existing frame with a low-opacity black overlay, leaving
//     fading trails instead of clearing,
// 3.  draws the active pattern,
// 4.  checks the auto-switch rule.
//
// The particle pool belongs to the `ParticleSystem` state. Leaving that state
// parks the simulator untouched: its particles are frozen while another mode
// is shown and resume from where they were on the next visit.

use crate::config::PatternConfig;
use crate::core_modules::particle_simulator::ParticleSimulator;
use crate::core_modules::patterns::{self, PatternInput};
use crate::core_modules::surface::Surface;
use crate::error::RenderError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Simulated time added per rendered frame.
pub const TIME_STEP: f64 = 1.0 / 60.0;
/// Opacity (out of 255) of the black overlay composited each frame.
pub const FADE_ALPHA: u8 = 50;

/// The four visual modes, in cycling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Spiral,
    Wave,
    ParticleSystem,
    Geometric,
}

impl PatternKind {
    pub const ALL: [PatternKind; 4] = [
        PatternKind::Spiral,
        PatternKind::Wave,
        PatternKind::ParticleSystem,
        PatternKind::Geometric,
    ];

    pub fn index(self) -> usize {
        match self {
            PatternKind::Spiral => 0,
            PatternKind::Wave => 1,
            PatternKind::ParticleSystem => 2,
            PatternKind::Geometric => 3,
        }
    }

    /// The following mode, wrapping modulo 4.
    pub fn next(self) -> PatternKind {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            PatternKind::Spiral => "spiral",
            PatternKind::Wave => "wave",
            PatternKind::ParticleSystem => "particles",
            PatternKind::Geometric => "geometric",
        }
    }
}

enum ActivePattern {
    Spiral,
    Wave,
    ParticleSystem(ParticleSimulator),
    Geometric,
}

impl ActivePattern {
    fn kind(&self) -> PatternKind {
        match self {
            ActivePattern::Spiral => PatternKind::Spiral,
            ActivePattern::Wave => PatternKind::Wave,
            ActivePattern::ParticleSystem(_) => PatternKind::ParticleSystem,
            ActivePattern::Geometric => PatternKind::Geometric,
        }
    }
}

/// Why the pattern changed during a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCause {
    Manual,
    Motion,
}

/// What happened during one `render_frame` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// The pattern that was drawn.
    pub drawn: PatternKind,
    /// Set when the intensity rule advanced the state after drawing.
    pub auto_switched: bool,
    /// Primitives drawn by the pattern.
    pub primitives: usize,
}

pub struct PatternRenderer {
    active: ActivePattern,
    parked_simulator: Option<ParticleSimulator>,
    config: PatternConfig,
    rng: StdRng,
    centroid: (i32, i32),
    intensity: f64,
    time: f64,
}

impl PatternRenderer {
    pub fn new(config: PatternConfig, rng: StdRng) -> Self {
        let centroid = (
            (config.resolution.0 / 2) as i32,
            (config.resolution.1 / 2) as i32,
        );
        Self {
            active: ActivePattern::Spiral,
            parked_simulator: None,
            config,
            rng,
            centroid,
            intensity: 0.0,
            time: 0.0,
        }
    }

    pub fn seeded(config: PatternConfig, seed: u64) -> Self {
        Self::new(config, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(config: PatternConfig) -> Self {
        Self::new(config, StdRng::from_entropy())
    }

    pub fn pattern(&self) -> PatternKind {
        self.active.kind()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn centroid(&self) -> (i32, i32) {
        self.centroid
    }

    /// Live particles, zero outside the particle mode.
    pub fn particle_count(&self) -> usize {
        match &self.active {
            ActivePattern::ParticleSystem(simulator) => simulator.len(),
            _ => 0,
        }
    }

    /// Feeds the latest motion in display coordinates. Intensity is clamped to `[0, 1]`.
    pub fn update_motion(&mut self, centroid: (i32, i32), intensity: f64) {
        self.centroid = centroid;
        self.intensity = if intensity.is_nan() {
            0.0
        } else {
            intensity.clamp(0.0, 1.0)
        };
    }

    pub fn set_max_particles(&mut self, max_particles: usize) {
        self.config.max_particles = max_particles;
        if let ActivePattern::ParticleSystem(simulator) = &mut self.active {
            simulator.set_max_particles(max_particles);
        }
        if let Some(simulator) = self.parked_simulator.as_mut() {
            simulator.set_max_particles(max_particles);
        }
    }

    /// Moves to the next pattern, wrapping after `Geometric`.
    pub fn advance(&mut self, cause: SwitchCause) -> PatternKind {
        let next = self.pattern().next();
        let previous = std::mem::replace(&mut self.active, ActivePattern::Spiral);
        if let ActivePattern::ParticleSystem(simulator) = previous {
            self.parked_simulator = Some(simulator);
        }

        self.active = match next {
            PatternKind::Spiral => ActivePattern::Spiral,
            PatternKind::Wave => ActivePattern::Wave,
            PatternKind::ParticleSystem => {
                let simulator = match self.parked_simulator.take() {
                    Some(simulator) => simulator,
                    None => {
                        let rng = StdRng::from_rng(&mut self.rng)
                            .unwrap_or_else(|_| StdRng::seed_from_u64(self.time.to_bits()));
                        ParticleSimulator::new(&self.config, rng)
                    }
                };
                ActivePattern::ParticleSystem(simulator)
            }
            PatternKind::Geometric => ActivePattern::Geometric,
        };

        debug!(pattern = next.name(), ?cause, "pattern advanced");
        next
    }

    /// Renders one frame and applies the automatic switch rule.
    pub fn render_frame<S: Surface>(&mut self, surface: &mut S) -> Result<FrameReport, RenderError> {
        self.time += TIME_STEP;
        surface.fade(FADE_ALPHA)?;

        let input = PatternInput {
            centroid: self.centroid,
            intensity: self.intensity,
            time: self.time,
        };

        let drawn = self.pattern();
        let primitives = match &mut self.active {
            ActivePattern::Spiral => patterns::draw_spiral(&input, surface)?,
            ActivePattern::Wave => patterns::draw_wave(&input, surface)?,
            ActivePattern::ParticleSystem(simulator) => {
                simulator.spawn_from_motion(input.centroid, input.intensity);
                simulator.tick();
                simulator.render(surface)?;
                simulator.len()
            }
            ActivePattern::Geometric => patterns::draw_geometric(&input, surface)?,
        };

        let auto_switched = self.intensity > self.config.auto_switch_threshold;
        if auto_switched {
            self.advance(SwitchCause::Motion);
        }

        Ok(FrameReport {
            drawn,
            auto_switched,
            primitives,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::canvas::Canvas;

    fn renderer() -> PatternRenderer {
        PatternRenderer::seeded(PatternConfig::standard(), 11)
    }

    #[test]
    fn manual_advance_cycles_through_four_states() {
        let mut renderer = renderer();
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(renderer.pattern());
            renderer.advance(SwitchCause::Manual);
        }
        assert_eq!(
            seen,
            vec![
                PatternKind::Spiral,
                PatternKind::Wave,
                PatternKind::ParticleSystem,
                PatternKind::Geometric,
                PatternKind::Spiral,
                PatternKind::Wave,
                PatternKind::ParticleSystem,
                PatternKind::Geometric,
            ]
        );
        assert_eq!(renderer.pattern(), PatternKind::Spiral);
    }

    #[test]
    fn strong_motion_advances_once_per_frame() {
        let mut renderer = renderer();
        let mut canvas = Canvas::new(800, 600).unwrap();
        renderer.update_motion((400, 300), 0.9);

        let first = renderer.render_frame(&mut canvas).unwrap();
        let second = renderer.render_frame(&mut canvas).unwrap();

        assert!(first.auto_switched && second.auto_switched);
        assert_eq!(first.drawn, PatternKind::Spiral);
        assert_eq!(second.drawn, PatternKind::Wave);
        assert_eq!(renderer.pattern(), PatternKind::ParticleSystem);
    }

    #[test]
    fn threshold_itself_does_not_switch() {
        let mut renderer = renderer();
        let mut canvas = Canvas::new(800, 600).unwrap();
        renderer.update_motion((400, 300), 0.8);
        let report = renderer.render_frame(&mut canvas).unwrap();
        assert!(!report.auto_switched);
        assert_eq!(renderer.pattern(), PatternKind::Spiral);
    }

    #[test]
    fn time_advances_by_a_fixed_step() {
        let mut renderer = renderer();
        let mut canvas = Canvas::new(100, 100).unwrap();
        for _ in 0..60 {
            renderer.render_frame(&mut canvas).unwrap();
        }
        assert!((renderer.time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn intensity_is_clamped() {
        let mut renderer = renderer();
        renderer.update_motion((0, 0), 42.0);
        assert_eq!(renderer.intensity(), 1.0);
        renderer.update_motion((0, 0), -1.0);
        assert_eq!(renderer.intensity(), 0.0);
        renderer.update_motion((0, 0), f64::NAN);
        assert_eq!(renderer.intensity(), 0.0);
    }

    #[test]
    fn particles_are_frozen_while_another_mode_is_shown() {
        let mut renderer = renderer();
        let mut canvas = Canvas::new(800, 600).unwrap();
        renderer.advance(SwitchCause::Manual);
        renderer.advance(SwitchCause::Manual);
        assert_eq!(renderer.pattern(), PatternKind::ParticleSystem);

        renderer.update_motion((400, 300), 0.5);
        let report = renderer.render_frame(&mut canvas).unwrap();
        assert_eq!(report.drawn, PatternKind::ParticleSystem);
        assert_eq!(renderer.particle_count(), 5);
        assert!(canvas.lit_pixels() > 0);

        renderer.advance(SwitchCause::Manual);
        assert_eq!(renderer.particle_count(), 0);
        for _ in 0..4 {
            renderer.render_frame(&mut canvas).unwrap();
        }
        for _ in 0..3 {
            renderer.advance(SwitchCause::Manual);
        }
        assert_eq!(renderer.pattern(), PatternKind::ParticleSystem);
        assert_eq!(renderer.particle_count(), 5);
    }

    #[test]
    fn particle_count_respects_a_lowered_cap() {
        let mut renderer = renderer();
        let mut canvas = Canvas::new(800, 600).unwrap();
        renderer.advance(SwitchCause::Manual);
        renderer.advance(SwitchCause::Manual);
        renderer.update_motion((400, 300), 0.7);
        for _ in 0..10 {
            renderer.render_frame(&mut canvas).unwrap();
        }
        renderer.set_max_particles(20);
        assert!(renderer.particle_count() <= 20);
        renderer.render_frame(&mut canvas).unwrap();
        assert!(renderer.particle_count() <= 20);
    }

    #[test]
    fn fade_leaves_trails_instead_of_clearing() {
        let mut renderer = renderer();
        let mut canvas = Canvas::new(800, 600).unwrap();
        renderer.update_motion((400, 300), 0.5);
        renderer.render_frame(&mut canvas).unwrap();
        let lit_after_one = canvas.lit_pixels();

        renderer.update_motion((-5000, -5000), 0.5);
        renderer.render_frame(&mut canvas).unwrap();
        assert_eq!(canvas.lit_pixels(), lit_after_one);
    }
}
