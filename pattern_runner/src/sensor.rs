// THEORY:
// Real sensor devices backed by OpenCV `videoio`.
//
// `OpenNiSensor` reads a Kinect-class device through the OpenNI2 backend. The
// raw depth map is 16-bit millimetres; it is scaled into 8 bits (0..4096 mm
// maps to 0..255) so it matches the depth samples the motion extractor
// expects.
//
// `WebcamSensor` is a stand-in for machines without a depth camera: the
// greyscale webcam image is treated as if it were depth. Brightness changes
// are not depth changes, but moving objects still produce a usable mask.
//
// Both resize every frame to the configured sensor resolution, so the render
// flow can rely on a single sensor geometry.

use kinetic_patterns::core_modules::depth_frame::depth_frame::{ColorFrame, DepthFrame};
use kinetic_patterns::error::SensorError;
use kinetic_patterns::sensor_flow::{FrameSink, SensorDevice};
use opencv::{
    core::{self, Mat, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::debug;

/// Depth, in millimetres, that maps to the brightest 8-bit sample.
const DEPTH_RANGE_MM: f64 = 4096.0;

fn acquisition(err: opencv::Error) -> SensorError {
    SensorError::Acquisition(err.to_string())
}

fn open_capture(index: i32, api: i32) -> Result<VideoCapture, SensorError> {
    let capture = VideoCapture::new(index, api)
        .map_err(|err| SensorError::InitializationFailed(err.to_string()))?;
    let opened = capture
        .is_opened()
        .map_err(|err| SensorError::InitializationFailed(err.to_string()))?;
    if !opened {
        return Err(SensorError::InitializationFailed(format!(
            "capture device {index} did not open"
        )));
    }
    Ok(capture)
}

/// Resizes a single-channel 8-bit image to `size` and copies it out.
fn depth_frame(gray: &Mat, size: (u32, u32)) -> Result<DepthFrame, SensorError> {
    let mut resized = Mat::default();
    imgproc::resize(
        gray,
        &mut resized,
        Size::new(size.0 as i32, size.1 as i32),
        0.0,
        0.0,
        imgproc::INTER_NEAREST,
    )
    .map_err(acquisition)?;
    let samples = resized.data_bytes().map_err(acquisition)?.to_vec();
    Ok(DepthFrame::new(size.0, size.1, samples))
}

fn color_frame(bgr: &Mat) -> Result<ColorFrame, SensorError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(acquisition)?;
    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let bytes = rgb.data_bytes().map_err(acquisition)?.to_vec();
    Ok(ColorFrame::new(width, height, bytes))
}

/// A Kinect-class depth camera behind OpenNI2.
pub struct OpenNiSensor {
    index: i32,
    size: (u32, u32),
    capture: Option<VideoCapture>,
    raw_depth: Mat,
    scaled_depth: Mat,
    bgr: Mat,
}

impl OpenNiSensor {
    pub fn new(index: i32, size: (u32, u32)) -> Self {
        Self {
            index,
            size,
            capture: None,
            raw_depth: Mat::default(),
            scaled_depth: Mat::default(),
            bgr: Mat::default(),
        }
    }
}

impl SensorDevice for OpenNiSensor {
    fn name(&self) -> &str {
        "openni"
    }

    fn open(&mut self) -> Result<(), SensorError> {
        self.capture = Some(open_capture(self.index, videoio::CAP_OPENNI2)?);
        Ok(())
    }

    fn process_events(&mut self, sink: &mut dyn FrameSink) -> Result<(), SensorError> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| SensorError::Disconnected("device is not open".to_string()))?;

        if !capture.grab().map_err(acquisition)? {
            return Err(SensorError::Disconnected("no frame from OpenNI device".to_string()));
        }

        let has_depth = capture
            .retrieve(&mut self.raw_depth, videoio::CAP_OPENNI_DEPTH_MAP)
            .map_err(acquisition)?;
        if has_depth && !self.raw_depth.empty() {
            self.raw_depth
                .convert_to(&mut self.scaled_depth, core::CV_8U, 255.0 / DEPTH_RANGE_MM, 0.0)
                .map_err(acquisition)?;
            sink.on_depth_frame(depth_frame(&self.scaled_depth, self.size)?);
        }

        let has_color = capture
            .retrieve(&mut self.bgr, videoio::CAP_OPENNI_BGR_IMAGE)
            .map_err(acquisition)?;
        if has_color && !self.bgr.empty() {
            sink.on_color_frame(color_frame(&self.bgr)?);
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(err) = capture.release() {
                debug!(%err, "OpenNI release failed");
            }
        }
    }
}

/// An ordinary webcam whose greyscale image stands in for depth.
pub struct WebcamSensor {
    index: i32,
    size: (u32, u32),
    capture: Option<VideoCapture>,
    bgr: Mat,
    gray: Mat,
}

impl WebcamSensor {
    pub fn new(index: i32, size: (u32, u32)) -> Self {
        Self {
            index,
            size,
            capture: None,
            bgr: Mat::default(),
            gray: Mat::default(),
        }
    }
}

impl SensorDevice for WebcamSensor {
    fn name(&self) -> &str {
        "webcam"
    }

    fn open(&mut self) -> Result<(), SensorError> {
        self.capture = Some(open_capture(self.index, videoio::CAP_ANY)?);
        Ok(())
    }

    fn process_events(&mut self, sink: &mut dyn FrameSink) -> Result<(), SensorError> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| SensorError::Disconnected("device is not open".to_string()))?;

        if !capture.read(&mut self.bgr).map_err(acquisition)? || self.bgr.empty() {
            return Err(SensorError::Disconnected("webcam returned no frame".to_string()));
        }

        imgproc::cvt_color(&self.bgr, &mut self.gray, imgproc::COLOR_BGR2GRAY, 0)
            .map_err(acquisition)?;
        sink.on_color_frame(color_frame(&self.bgr)?);
        sink.on_depth_frame(depth_frame(&self.gray, self.size)?);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(err) = capture.release() {
                debug!(%err, "webcam release failed");
            }
        }
    }
}
