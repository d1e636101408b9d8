// THEORY:
// The `MotionExtractor` turns the raw stream of depth frames into a compact
// "motion signal". It is the only stateful piece of the sensor side: it keeps
// the previous frame so that each new frame can be differenced against it.
//
// Algorithm, per frame:
// 1.  **Differencing**: per-pixel absolute difference against the previous frame.
// 2.  **Thresholding**: a pixel is "moving" when its difference is strictly above
//     the movement threshold. The result is a binary mask (255 set, 0 clear).
// 3.  **Intensity**: the number of set pixels in the mask.
// 4.  **Centroid**: first-order image moments of the mask (m10/m00, m01/m00).
//     An empty mask has no mass, so the centroid falls back to the frame centre.
//
// Noisy or broken input never becomes an error here. A malformed frame is simply
// "no motion" for that tick, which keeps the render side oblivious to sensor
// hiccups.

use crate::core_modules::depth_frame::depth_frame::DepthFrame;
use tracing::debug;

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// A binary grid of moving pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionMask {
    pub width: u32,
    pub height: u32,
    pub values: Vec<u8>,
}

impl MotionMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![MASK_OFF; width as usize * height as usize],
        }
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.values[(y * self.width + x) as usize] == MASK_ON
    }

    pub fn set_count(&self) -> usize {
        self.values.iter().filter(|&&v| v == MASK_ON).count()
    }
}

/// The per-frame summary of change handed from the sensor side to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSignal {
    /// Moving pixels of the analysed frame.
    pub mask: MotionMask,
    /// Raw intensity: the number of moving pixels, in full sensor resolution.
    pub intensity: f64,
    /// Centre of mass of the mask, in sensor pixels.
    pub centroid: (i32, i32),
}

impl MotionSignal {
    /// A signal with no movement, centred on a frame of the given size.
    pub fn still(width: u32, height: u32) -> Self {
        Self {
            mask: MotionMask::empty(width, height),
            intensity: 0.0,
            centroid: ((width / 2) as i32, (height / 2) as i32),
        }
    }

    /// Intensity mapped into `[0, 1]` by a fixed divisor.
    pub fn normalized_intensity(&self, divisor: f64) -> f64 {
        normalize_intensity(self.intensity, divisor)
    }
}

/// Scales a raw intensity by `divisor` and clamps it into `[0, 1]`.
pub fn normalize_intensity(raw: f64, divisor: f64) -> f64 {
    if !raw.is_finite() || divisor <= 0.0 {
        return 0.0;
    }
    (raw / divisor).clamp(0.0, 1.0)
}

/// Stateful frame differencer.
pub struct MotionExtractor {
    threshold: u8,
    sample_rate: u32,
    previous: Option<DepthFrame>,
    /// Full-resolution size of the last well-formed frame.
    last_size: Option<(u32, u32)>,
}

impl MotionExtractor {
    pub fn new(threshold: u8, sample_rate: u32) -> Self {
        Self {
            threshold,
            sample_rate: sample_rate.max(1),
            previous: None,
            last_size: None,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Differences `current` against the previous frame and stores it for the next call.
    pub fn process(&mut self, current: DepthFrame) -> MotionSignal {
        if !current.is_well_formed() {
            debug!(
                width = current.width,
                height = current.height,
                len = current.samples.len(),
                "malformed depth frame treated as no motion"
            );
            return self.still_signal();
        }

        let (full_width, full_height) = (current.width, current.height);
        let analysed = current.decimate(self.sample_rate);

        let signal = match self.previous.as_ref() {
            Some(previous) if previous.same_shape(&analysed) => {
                self.diff(previous, &analysed, full_width, full_height)
            }
            Some(_) => {
                debug!("depth frame size changed, restarting motion history");
                Self::first_signal(&analysed, full_width, full_height)
            }
            None => Self::first_signal(&analysed, full_width, full_height),
        };

        self.previous = Some(analysed);
        self.last_size = Some((full_width, full_height));
        signal
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.last_size = None;
    }

    /// "No motion" without trusting the dimensions of a rejected frame: the
    /// mask matches the last good analysed frame and the centroid its centre.
    fn still_signal(&self) -> MotionSignal {
        let mask = match self.previous.as_ref() {
            Some(previous) => MotionMask::empty(previous.width, previous.height),
            None => MotionMask::empty(0, 0),
        };
        let (width, height) = self.last_size.unwrap_or((0, 0));
        MotionSignal {
            mask,
            intensity: 0.0,
            centroid: ((width / 2) as i32, (height / 2) as i32),
        }
    }

    fn first_signal(analysed: &DepthFrame, full_width: u32, full_height: u32) -> MotionSignal {
        let mut signal = MotionSignal::still(full_width, full_height);
        signal.mask = MotionMask::empty(analysed.width, analysed.height);
        signal
    }

    fn diff(
        &self,
        previous: &DepthFrame,
        current: &DepthFrame,
        full_width: u32,
        full_height: u32,
    ) -> MotionSignal {
        let mut values = Vec::with_capacity(current.samples.len());
        let mut m00 = 0u64;
        let mut m10 = 0u64;
        let mut m01 = 0u64;

        for (index, (&now, &before)) in current.samples.iter().zip(&previous.samples).enumerate() {
            if now.abs_diff(before) > self.threshold {
                values.push(MASK_ON);
                let x = index as u64 % current.width as u64;
                let y = index as u64 / current.width as u64;
                m00 += 1;
                m10 += x;
                m01 += y;
            } else {
                values.push(MASK_OFF);
            }
        }

        let mask = MotionMask {
            width: current.width,
            height: current.height,
            values,
        };

        let rate = self.sample_rate as f64;
        let centroid = if m00 == 0 {
            ((full_width / 2) as i32, (full_height / 2) as i32)
        } else {
            (
                (m10 as f64 / m00 as f64 * rate) as i32,
                (m01 as f64 / m00 as f64 * rate) as i32,
            )
        };

        MotionSignal {
            mask,
            intensity: m00 as f64 * rate * rate,
            centroid,
        }
    }
}
