// THEORY:
// The `ParticleSimulator` is a small fixed-timestep physics loop. Motion spawns
// particles around its centroid, every tick moves them under gravity and
// friction while their life counts down, and rendering fades each particle
// toward black and shrinks it as it ages.
//
// One tick is one rendered frame. There is no variable-timestep correction, so
// the caller must tick exactly once per frame.

use crate::config::PatternConfig;
use crate::core_modules::particle::{PALETTE, PARTICLE_MAX_LIFE, Particle, ParticlePool};
use crate::core_modules::surface::Surface;
use crate::error::RenderError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const GRAVITY: f64 = 0.1;
const FRICTION: f64 = 0.99;
const SPAWN_SPREAD: i32 = 50;
const MIN_SPEED: f64 = 1.0;
const MAX_SPEED: f64 = 5.0;
const MIN_RADIUS: f64 = 2.0;
const MAX_RADIUS: f64 = 8.0;

pub struct ParticleSimulator {
    pool: ParticlePool,
    rng: StdRng,
    spawn_threshold: f64,
    spawn_per_intensity: f64,
}

impl ParticleSimulator {
    pub fn new(config: &PatternConfig, rng: StdRng) -> Self {
        Self {
            pool: ParticlePool::with_capacity(config.max_particles),
            rng,
            spawn_threshold: config.spawn_threshold,
            spawn_per_intensity: config.spawn_per_intensity,
        }
    }

    pub fn seeded(config: &PatternConfig, seed: u64) -> Self {
        Self::new(config, StdRng::seed_from_u64(seed))
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Lowers or raises the particle cap; the oldest particles go first.
    pub fn set_max_particles(&mut self, max_particles: usize) {
        self.pool.set_capacity(max_particles);
    }

    /// Drops every particle but keeps the allocation.
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    /// Spawns particles around `centroid` in proportion to `intensity`.
    ///
    /// Returns how many were spawned.
    pub fn spawn_from_motion(&mut self, centroid: (i32, i32), intensity: f64) -> usize {
        if intensity <= self.spawn_threshold || self.pool.is_full() {
            return 0;
        }
        let wanted = (intensity * self.spawn_per_intensity).floor().max(0.0) as usize;
        let mut spawned = 0;
        for _ in 0..wanted {
            let particle = self.new_particle(centroid);
            if self.pool.insert(particle).is_none() {
                break;
            }
            spawned += 1;
        }
        spawned
    }

    /// Inserts a particle directly. Returns `false` when the pool is full.
    pub fn push(&mut self, particle: Particle) -> bool {
        self.pool.insert(particle).is_some()
    }

    /// Advances every particle by one frame and frees the dead ones.
    pub fn tick(&mut self) {
        self.pool.update_retain(|particle| {
            particle.position.0 += particle.velocity.0;
            particle.position.1 += particle.velocity.1;
            particle.life -= 1;

            particle.velocity.1 += GRAVITY;
            particle.velocity.0 *= FRICTION;
            particle.velocity.1 *= FRICTION;

            particle.is_alive()
        });
    }

    /// Draws every live particle, faded and shrunk by its remaining life.
    pub fn render<S: Surface>(&self, surface: &mut S) -> Result<(), RenderError> {
        for particle in self.pool.iter() {
            let ratio = particle.life_ratio();
            let radius = (particle.radius * ratio) as i32;
            if radius <= 0 {
                continue;
            }
            let color = PALETTE[particle.color_index % PALETTE.len()].scaled(ratio);
            let center = (particle.position.0 as i32, particle.position.1 as i32);
            surface.fill_circle(center, radius, color)?;
        }
        Ok(())
    }

    fn new_particle(&mut self, centroid: (i32, i32)) -> Particle {
        let offset_x = self.rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD);
        let offset_y = self.rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD);
        let angle = self.rng.gen_range(0.0..2.0 * PI);
        let speed = self.rng.gen_range(MIN_SPEED..MAX_SPEED);

        Particle {
            position: (
                (centroid.0 + offset_x) as f64,
                (centroid.1 + offset_y) as f64,
            ),
            velocity: (angle.cos() * speed, angle.sin() * speed),
            life: PARTICLE_MAX_LIFE,
            max_life: PARTICLE_MAX_LIFE,
            color_index: self.rng.gen_range(0..PALETTE.len()),
            radius: self.rng.gen_range(MIN_RADIUS..MAX_RADIUS),
        }
    }
}
