// THEORY:
// A `Particle` is a plain, fixed-shape record: position, velocity, remaining
// life, a palette index and a radius. Particles live in a `ParticlePool`, a
// contiguous slot array with a free list. A dead particle's slot goes on the
// free list and is reused by the next spawn, so steady-state simulation never
// reallocates.
//
// Identity is the slot index. Each occupied slot also carries an insertion
// sequence number so the pool can evict the oldest particles first when its
// capacity is lowered.

use crate::core_modules::surface::Color;

/// A fixed 6-entry palette shared by particles and geometric shapes.
pub const PALETTE: [Color; 6] = [
    Color::new(255, 100, 100),
    Color::new(100, 255, 100),
    Color::new(100, 100, 255),
    Color::new(255, 255, 100),
    Color::new(255, 100, 255),
    Color::new(100, 255, 255),
];

/// Ticks a particle lives for.
pub const PARTICLE_MAX_LIFE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: (f64, f64),
    pub velocity: (f64, f64),
    pub life: i32,
    pub max_life: i32,
    pub color_index: usize,
    pub radius: f64,
}

impl Particle {
    /// Remaining life as a fraction of the full lifetime.
    pub fn life_ratio(&self) -> f64 {
        if self.max_life <= 0 {
            return 0.0;
        }
        (self.life as f64 / self.max_life as f64).clamp(0.0, 1.0)
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0
    }
}

#[derive(Debug, Clone)]
struct Slot {
    particle: Particle,
    sequence: u64,
    occupied: bool,
}

/// Bounded slot storage for particles.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
    capacity: usize,
    next_sequence: u64,
}

impl ParticlePool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            live: 0,
            capacity,
            next_sequence: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.live >= self.capacity
    }

    /// Stores a particle, returning its slot. `None` when the pool is full.
    pub fn insert(&mut self, particle: Particle) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let slot = Slot {
            particle,
            sequence,
            occupied: true,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.live += 1;
        Some(index)
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.slots
            .get(index)
            .filter(|slot| slot.occupied)
            .map(|slot| &slot.particle)
    }

    /// Frees a slot. Removing an already free slot is a no-op.
    pub fn remove(&mut self, index: usize) -> Option<Particle> {
        let slot = self.slots.get_mut(index)?;
        if !slot.occupied {
            return None;
        }
        slot.occupied = false;
        self.free.push(index);
        self.live -= 1;
        Some(slot.particle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.slots
            .iter()
            .filter(|slot| slot.occupied)
            .map(|slot| &slot.particle)
    }

    /// Visits every live particle; those for which `keep` returns false are freed.
    pub fn update_retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&mut Particle) -> bool,
    {
        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            if slot.occupied && !keep(&mut slot.particle) {
                slot.occupied = false;
                self.free.push(index);
                self.live -= 1;
            }
        }
    }

    /// Changes the cap, evicting the oldest-inserted particles when it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.live > self.capacity {
            let oldest = self
                .slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.occupied)
                .min_by_key(|(_, slot)| slot.sequence)
                .map(|(index, _)| index);
            match oldest {
                Some(index) => {
                    self.remove(index);
                }
                None => break,
            }
        }
    }

    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.occupied = false;
            self.free.push(index);
        }
        self.live = 0;
    }
}
