// THEORY:
// `SyntheticDepthSensor` stands in for real depth hardware. It renders a flat
// background with one near block that bounces across the frame, so every
// frame after the first differs from its predecessor along the block's
// leading and trailing edges. Demos, headless snapshots and the integration
// test all run against it.

use crate::core_modules::depth_frame::depth_frame::{ColorFrame, DepthFrame};
use crate::error::SensorError;
use crate::sensor_flow::{FrameSink, SensorDevice};

const BACKGROUND_DEPTH: u8 = 20;
const BLOCK_DEPTH: u8 = 220;

pub struct SyntheticDepthSensor {
    width: u32,
    height: u32,
    block: u32,
    speed: i32,
    position: (i32, i32),
    direction: (i32, i32),
    fail_open: bool,
    opened: bool,
    frames: u64,
}

impl SyntheticDepthSensor {
    pub fn new(width: u32, height: u32) -> Self {
        let block = (width.min(height) / 6).max(1);
        Self {
            width,
            height,
            block,
            speed: 8,
            position: (0, (height / 3) as i32),
            direction: (1, 1),
            fail_open: false,
            opened: false,
            frames: 0,
        }
    }

    /// A device whose `open` always fails, for exercising the no-sensor path.
    pub fn unavailable(width: u32, height: u32) -> Self {
        Self {
            fail_open: true,
            ..Self::new(width, height)
        }
    }

    pub fn with_block(mut self, block: u32, speed: i32) -> Self {
        self.block = block.max(1);
        self.speed = speed;
        self
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames
    }

    /// Produces the next depth frame and moves the block.
    pub fn next_frame(&mut self) -> DepthFrame {
        let mut samples = vec![BACKGROUND_DEPTH; (self.width * self.height) as usize];
        let (bx, by) = self.position;
        for y in by.max(0)..(by + self.block as i32).min(self.height as i32) {
            let row = y as usize * self.width as usize;
            for x in bx.max(0)..(bx + self.block as i32).min(self.width as i32) {
                samples[row + x as usize] = BLOCK_DEPTH;
            }
        }
        self.step();
        self.frames += 1;
        DepthFrame::new(self.width, self.height, samples)
    }

    fn step(&mut self) {
        let max_x = self.width.saturating_sub(self.block) as i32;
        let max_y = self.height.saturating_sub(self.block) as i32;
        let (mut x, mut y) = self.position;
        x += self.direction.0 * self.speed;
        y += self.direction.1 * self.speed / 2;
        if x <= 0 || x >= max_x {
            self.direction.0 = -self.direction.0;
            x = x.clamp(0, max_x);
        }
        if y <= 0 || y >= max_y {
            self.direction.1 = -self.direction.1;
            y = y.clamp(0, max_y);
        }
        self.position = (x, y);
    }

    fn color_frame(depth: &DepthFrame) -> ColorFrame {
        let rgb = depth
            .samples
            .iter()
            .flat_map(|&sample| [sample, sample, sample])
            .collect();
        ColorFrame::new(depth.width, depth.height, rgb)
    }
}

impl SensorDevice for SyntheticDepthSensor {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&mut self) -> Result<(), SensorError> {
        if self.fail_open {
            return Err(SensorError::InitializationFailed(
                "synthetic sensor configured as unavailable".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SensorError::InitializationFailed(format!(
                "cannot synthesize {}x{} frames",
                self.width, self.height
            )));
        }
        self.opened = true;
        Ok(())
    }

    fn process_events(&mut self, sink: &mut dyn FrameSink) -> Result<(), SensorError> {
        if !self.opened {
            return Err(SensorError::Disconnected("device is not open".to_string()));
        }
        let depth = self.next_frame();
        sink.on_color_frame(Self::color_frame(&depth));
        sink.on_depth_frame(depth);
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::motion_extractor::MotionExtractor;

    #[derive(Default)]
    struct CollectingSink {
        depth: Vec<DepthFrame>,
        color: usize,
    }

    impl FrameSink for CollectingSink {
        fn on_depth_frame(&mut self, frame: DepthFrame) {
            self.depth.push(frame);
        }

        fn on_color_frame(&mut self, _frame: ColorFrame) {
            self.color += 1;
        }
    }

    #[test]
    fn consecutive_frames_show_motion() {
        let mut sensor = SyntheticDepthSensor::new(64, 48).with_block(10, 4);
        let mut extractor = MotionExtractor::new(30, 1);
        let first = extractor.process(sensor.next_frame());
        assert_eq!(first.intensity, 0.0);
        let second = extractor.process(sensor.next_frame());
        assert!(second.intensity > 0.0);
        assert_eq!(sensor.frames_emitted(), 2);
    }

    #[test]
    fn block_stays_inside_the_frame() {
        let mut sensor = SyntheticDepthSensor::new(40, 30).with_block(10, 7);
        for _ in 0..200 {
            let frame = sensor.next_frame();
            let lit = frame.samples.iter().filter(|&&s| s == BLOCK_DEPTH).count();
            assert_eq!(lit, 100);
        }
    }

    #[test]
    fn process_events_requires_open() {
        let mut sensor = SyntheticDepthSensor::new(16, 16);
        let mut sink = CollectingSink::default();
        assert!(sensor.process_events(&mut sink).is_err());

        sensor.open().expect("opens");
        sensor.process_events(&mut sink).expect("delivers");
        assert_eq!(sink.depth.len(), 1);
        assert_eq!(sink.color, 1);

        sensor.close();
        assert!(sensor.process_events(&mut sink).is_err());
    }

    #[test]
    fn unavailable_sensor_fails_to_open() {
        let mut sensor = SyntheticDepthSensor::unavailable(16, 16);
        assert!(matches!(
            sensor.open(),
            Err(SensorError::InitializationFailed(_))
        ));
    }
}
