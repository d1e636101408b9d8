// THEORY:
// The `Canvas` is an in-memory `Surface` backed by an `image::RgbImage`. It is a
// small software rasterizer that exists so the pattern engine can run without a
// window: in unit tests, in the integration test, and in the runner's headless
// snapshot mode. Every primitive clips against the image edges, so patterns can
// hand it coordinates that wander off screen without any special casing.

use crate::core_modules::surface::{Color, Display, InputEvent, Surface};
use crate::error::RenderError;
use image::{Rgb, RgbImage};
use std::path::Path;

pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::SurfaceCreation {
                width,
                height,
                reason: "canvas dimensions must be non-zero".to_string(),
            });
        }
        Ok(Self {
            image: RgbImage::new(width, height),
        })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.image
            .get_pixel_checked(x, y)
            .map(|Rgb([red, green, blue])| Color::new(*red, *green, *blue))
    }

    /// Number of pixels that are not pure black.
    pub fn lit_pixels(&self) -> usize {
        self.image.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.save_with_format(path, image::ImageFormat::Png)
    }

    fn put(&mut self, x: i32, y: i32, color: Color) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
            self.image
                .put_pixel(x as u32, y as u32, Rgb([color.red, color.green, color.blue]));
        }
    }

    fn fill_span(&mut self, y: i32, x_start: i32, x_end: i32, color: Color) {
        let x_start = x_start.max(0);
        let x_end = x_end.min(self.image.width() as i32);
        for x in x_start..x_end {
            self.put(x, y, color);
        }
    }
}

impl Surface for Canvas {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn fade(&mut self, alpha: u8) -> Result<(), RenderError> {
        let keep = 255 - alpha as u16;
        for pixel in self.image.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as u16 * keep / 255) as u8;
            }
        }
        Ok(())
    }

    fn fill_circle(
        &mut self,
        center: (i32, i32),
        radius: i32,
        color: Color,
    ) -> Result<(), RenderError> {
        if radius <= 0 {
            return Ok(());
        }
        let (cx, cy) = center;
        let height = self.image.height() as i32;
        let radius_sq = radius * radius;
        for dy in -radius..=radius {
            let y = cy + dy;
            if y < 0 || y >= height {
                continue;
            }
            let half = ((radius_sq - dy * dy) as f64).sqrt() as i32;
            self.fill_span(y, cx - half, cx + half + 1, color);
        }
        Ok(())
    }

    fn fill_rect(
        &mut self,
        top_left: (i32, i32),
        size: (u32, u32),
        color: Color,
    ) -> Result<(), RenderError> {
        let (x, y) = top_left;
        let height = self.image.height() as i32;
        let y_end = (y + size.1 as i32).min(height);
        for row in y.max(0)..y_end {
            self.fill_span(row, x, x + size.0 as i32, color);
        }
        Ok(())
    }

    fn fill_polygon(&mut self, points: &[(f64, f64)], color: Color) -> Result<(), RenderError> {
        if points.len() < 3 {
            return Ok(());
        }
        let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let first_row = (min_y.floor() as i32).max(0);
        let last_row = (max_y.ceil() as i32).min(self.image.height() as i32 - 1);

        let mut crossings: Vec<f64> = Vec::with_capacity(points.len());
        for row in first_row..=last_row {
            // Even-odd scanline sampled at pixel centres.
            let scan_y = row as f64 + 0.5;
            crossings.clear();
            for (i, &(x0, y0)) in points.iter().enumerate() {
                let (x1, y1) = points[(i + 1) % points.len()];
                if (y0 <= scan_y && scan_y < y1) || (y1 <= scan_y && scan_y < y0) {
                    crossings.push(x0 + (scan_y - y0) * (x1 - x0) / (y1 - y0));
                }
            }
            crossings.sort_by(f64::total_cmp);
            for pair in crossings.chunks_exact(2) {
                let start = (pair[0] - 0.5).ceil() as i32;
                let end = (pair[1] - 0.5).ceil() as i32;
                self.fill_span(row, start, end, color);
            }
        }
        Ok(())
    }
}

/// A windowless `Display` that renders into a `Canvas`.
pub struct HeadlessDisplay {
    canvas: Canvas,
    frames_presented: u64,
}

impl HeadlessDisplay {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        Ok(Self {
            canvas: Canvas::new(width, height)?,
            frames_presented: 0,
        })
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl Display for HeadlessDisplay {
    type Target = Canvas;

    fn surface_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.frames_presented += 1;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }

    fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Color = Color::new(255, 255, 255);

    #[test]
    fn zero_sized_canvas_is_rejected() {
        assert!(matches!(
            Canvas::new(0, 10),
            Err(RenderError::SurfaceCreation { .. })
        ));
    }

    #[test]
    fn circle_is_clipped_at_the_edge() {
        let mut canvas = Canvas::new(20, 20).unwrap();
        canvas.fill_circle((0, 0), 5, WHITE).unwrap();
        assert_eq!(canvas.pixel(0, 0), Some(WHITE));
        assert_eq!(canvas.pixel(5, 0), Some(WHITE));
        assert_eq!(canvas.pixel(5, 5), Some(Color::BLACK));
        assert!(canvas.lit_pixels() > 0);
    }

    #[test]
    fn zero_radius_circle_draws_nothing() {
        let mut canvas = Canvas::new(10, 10).unwrap();
        canvas.fill_circle((5, 5), 0, WHITE).unwrap();
        assert_eq!(canvas.lit_pixels(), 0);
    }

    #[test]
    fn rect_covers_exactly_its_area() {
        let mut canvas = Canvas::new(30, 30).unwrap();
        canvas.fill_rect((10, 10), (8, 8), WHITE).unwrap();
        assert_eq!(canvas.lit_pixels(), 64);
        assert_eq!(canvas.pixel(17, 17), Some(WHITE));
        assert_eq!(canvas.pixel(18, 18), Some(Color::BLACK));
    }

    #[test]
    fn rect_partially_off_screen_is_clipped() {
        let mut canvas = Canvas::new(10, 10).unwrap();
        canvas.fill_rect((-4, 6), (8, 8), WHITE).unwrap();
        assert_eq!(canvas.lit_pixels(), 4 * 4);
    }

    #[test]
    fn polygon_fills_its_interior() {
        let mut canvas = Canvas::new(20, 20).unwrap();
        let square = [(2.0, 2.0), (12.0, 2.0), (12.0, 12.0), (2.0, 12.0)];
        canvas.fill_polygon(&square, WHITE).unwrap();
        assert_eq!(canvas.lit_pixels(), 100);
        assert_eq!(canvas.pixel(7, 7), Some(WHITE));
        assert_eq!(canvas.pixel(13, 7), Some(Color::BLACK));
    }

    #[test]
    fn degenerate_polygon_draws_nothing() {
        let mut canvas = Canvas::new(20, 20).unwrap();
        canvas.fill_polygon(&[(1.0, 1.0), (5.0, 5.0)], WHITE).unwrap();
        assert_eq!(canvas.lit_pixels(), 0);
    }

    #[test]
    fn fade_darkens_without_clearing() {
        let mut canvas = Canvas::new(4, 4).unwrap();
        canvas.fill_rect((0, 0), (4, 4), WHITE).unwrap();
        canvas.fade(50).unwrap();
        let faded = canvas.pixel(1, 1).unwrap();
        assert_eq!(faded, Color::new(205, 205, 205));
    }

    #[test]
    fn headless_display_counts_presents() {
        let mut display = HeadlessDisplay::new(8, 8).unwrap();
        display.present().unwrap();
        display.present().unwrap();
        assert_eq!(display.frames_presented(), 2);
        assert!(display.poll_events().is_empty());
    }
}
