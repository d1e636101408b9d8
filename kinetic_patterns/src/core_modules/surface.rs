// THEORY:
// The `surface` module is the seam between the pattern engine and whatever
// actually puts pixels on a screen. The engine only ever needs a handful of
// primitives (filled circle, filled rectangle, filled polygon and a darkening
// overlay), so those are all the `Surface` trait asks for.
//
// The `Display` trait wraps a surface with the window-side responsibilities:
// presenting the finished frame, reporting input, and tearing itself down.
// Keeping the two apart lets the renderer draw into an in-memory `Canvas` in
// tests and headless runs, and into an OpenCV window in the runner binary.

use crate::error::RenderError;

/// An RGB color with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Multiplies every channel by `ratio` (clamped to `[0, 1]`), truncating.
    pub fn scaled(self, ratio: f64) -> Self {
        let ratio = ratio.clamp(0.0, 1.0);
        Self {
            red: (self.red as f64 * ratio) as u8,
            green: (self.green as f64 * ratio) as u8,
            blue: (self.blue as f64 * ratio) as u8,
        }
    }
}

/// Drawing primitives used by the patterns.
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Composites black over the whole surface at `alpha / 255` opacity.
    fn fade(&mut self, alpha: u8) -> Result<(), RenderError>;

    fn fill_circle(&mut self, center: (i32, i32), radius: i32, color: Color)
    -> Result<(), RenderError>;

    fn fill_rect(
        &mut self,
        top_left: (i32, i32),
        size: (u32, u32),
        color: Color,
    ) -> Result<(), RenderError>;

    fn fill_polygon(&mut self, points: &[(f64, f64)], color: Color) -> Result<(), RenderError>;

    /// True when `(x, y)` lies on the surface.
    fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width() as f64 && y < self.height() as f64
    }
}

/// Input reported by the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// The window was closed.
    Quit,
    /// The escape key was pressed.
    Escape,
    /// The "next pattern" key was pressed.
    NextPattern,
}

/// A window (or stand-in) that owns a surface.
pub trait Display {
    type Target: Surface;

    fn surface_mut(&mut self) -> &mut Self::Target;

    fn present(&mut self) -> Result<(), RenderError>;

    fn poll_events(&mut self) -> Vec<InputEvent>;

    /// Releases window resources. Must tolerate being called more than once.
    fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_fades_toward_black() {
        let color = Color::new(255, 100, 10);
        assert_eq!(color.scaled(1.0), color);
        assert_eq!(color.scaled(0.5), Color::new(127, 50, 5));
        assert_eq!(color.scaled(0.0), Color::BLACK);
        assert_eq!(color.scaled(3.0), color);
    }
}
