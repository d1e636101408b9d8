pub mod canvas;
pub mod depth_frame;
pub mod motion_extractor;
pub mod particle;
pub mod particle_simulator;
pub mod pattern_renderer;
pub mod patterns;
pub mod surface;
