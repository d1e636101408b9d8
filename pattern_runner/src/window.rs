// THEORY:
// `MatSurface` implements the engine's drawing primitives on an OpenCV `Mat`
// (BGR, 8 bits per channel) using `imgproc`. `PatternWindow` wraps it in a
// `highgui` window: presenting is an `imshow`, input is read with a 1 ms
// `wait_key`, and closing the window counts as a quit.

use kinetic_patterns::core_modules::surface::{Color, Display, InputEvent, Surface};
use kinetic_patterns::error::RenderError;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Vector},
    highgui, imgproc,
    prelude::*,
};
use tracing::warn;

const KEY_ESCAPE: i32 = 27;
const KEY_SPACE: i32 = b' ' as i32;
const KEY_QUIT: i32 = b'q' as i32;

fn bgr(color: Color) -> Scalar {
    Scalar::new(color.blue as f64, color.green as f64, color.red as f64, 0.0)
}

fn draw_error(err: opencv::Error) -> RenderError {
    RenderError::Draw(err.to_string())
}

/// An OpenCV image the patterns draw into.
pub struct MatSurface {
    frame: Mat,
    width: u32,
    height: u32,
}

impl MatSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let frame = Mat::new_rows_cols_with_default(
            height as i32,
            width as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(|err| RenderError::SurfaceCreation {
            width,
            height,
            reason: err.to_string(),
        })?;
        Ok(Self {
            frame,
            width,
            height,
        })
    }

    pub fn mat(&self) -> &Mat {
        &self.frame
    }
}

impl Surface for MatSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fade(&mut self, alpha: u8) -> Result<(), RenderError> {
        let keep = 1.0 - alpha as f64 / 255.0;
        let mut faded = Mat::default();
        self.frame
            .convert_to(&mut faded, -1, keep, 0.0)
            .map_err(draw_error)?;
        self.frame = faded;
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
        imgproc::circle(
            &mut self.frame,
            Point::new(center.0, center.1),
            radius,
            bgr(color),
            -1,
            imgproc::LINE_8,
            0,
        )
        .map_err(draw_error)
    }

    fn fill_rect(
        &mut self,
        top_left: (i32, i32),
        size: (u32, u32),
        color: Color,
    ) -> Result<(), RenderError> {
        let rect = Rect::new(top_left.0, top_left.1, size.0 as i32, size.1 as i32);
        imgproc::rectangle(&mut self.frame, rect, bgr(color), -1, imgproc::LINE_8, 0)
            .map_err(draw_error)
    }

    fn fill_polygon(&mut self, points: &[(f64, f64)], color: Color) -> Result<(), RenderError> {
        if points.len() < 3 {
            return Ok(());
        }
        let outline: Vector<Point> = points
            .iter()
            .map(|&(x, y)| Point::new(x as i32, y as i32))
            .collect();
        let mut polygons = Vector::<Vector<Point>>::new();
        polygons.push(outline);
        imgproc::fill_poly(
            &mut self.frame,
            &polygons,
            bgr(color),
            imgproc::LINE_8,
            0,
            Point::default(),
        )
        .map_err(draw_error)
    }
}

/// A `highgui` window showing a `MatSurface`.
pub struct PatternWindow {
    name: String,
    surface: MatSurface,
    open: bool,
}

impl PatternWindow {
    pub fn open(name: &str, width: u32, height: u32) -> Result<Self, RenderError> {
        let surface = MatSurface::new(width, height)?;
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE).map_err(|err| {
            RenderError::SurfaceCreation {
                width,
                height,
                reason: err.to_string(),
            }
        })?;
        Ok(Self {
            name: name.to_string(),
            surface,
            open: true,
        })
    }

    fn closed_by_user(&self) -> bool {
        match highgui::get_window_property(&self.name, highgui::WND_PROP_VISIBLE) {
            Ok(visible) => visible < 1.0,
            Err(_) => true,
        }
    }
}

impl Display for PatternWindow {
    type Target = MatSurface;

    fn surface_mut(&mut self) -> &mut MatSurface {
        &mut self.surface
    }

    fn present(&mut self) -> Result<(), RenderError> {
        highgui::imshow(&self.name, self.surface.mat())
            .map_err(|err| RenderError::Present(err.to_string()))
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        match highgui::wait_key(1) {
            Ok(key) if key >= 0 => match key & 0xFF {
                KEY_ESCAPE => events.push(InputEvent::Escape),
                KEY_QUIT => events.push(InputEvent::Quit),
                KEY_SPACE => events.push(InputEvent::NextPattern),
                _ => {}
            },
            Ok(_) => {}
            Err(err) => warn!(%err, "could not read window input"),
        }
        if self.closed_by_user() {
            events.push(InputEvent::Quit);
        }
        events
    }

    fn shutdown(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(err) = highgui::destroy_window(&self.name) {
            warn!(%err, window = %self.name, "could not close window");
        }
    }
}

impl Drop for PatternWindow {
    fn drop(&mut self) {
        self.shutdown();
    }
}
