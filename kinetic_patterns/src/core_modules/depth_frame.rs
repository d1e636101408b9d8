// THEORY:
// The `DepthFrame` is the most fundamental unit of the engine: a "dumb" data
// container for one grid of 8-bit depth samples exactly as the sensor handed it
// over. It knows its own shape and can produce a decimated copy of itself, but
// it never compares itself with another frame; that is the job of the
// `MotionExtractor`.
//
// Frames are ephemeral. The sensor flow replaces the current frame on every
// callback and the extractor keeps at most one previous frame for differencing.

pub mod depth_frame {
    pub type Sample = u8;

    /// A single grid of depth samples, row-major, one byte per sensor pixel.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DepthFrame {
        /// The width of the frame in sensor pixels.
        pub width: u32,
        /// The height of the frame in sensor pixels.
        pub height: u32,
        /// Row-major samples, `width * height` long when well formed.
        pub samples: Vec<Sample>,
    }

    impl DepthFrame {
        pub fn new(width: u32, height: u32, samples: Vec<Sample>) -> Self {
            // Shape is not enforced here; callers check `is_well_formed`.
            Self {
                width,
                height,
                samples,
            }
        }

        /// A frame filled with a single value.
        pub fn filled(width: u32, height: u32, value: Sample) -> Self {
            Self::new(width, height, vec![value; (width * height) as usize])
        }

        /// True when the frame has a non-zero size and a buffer of exactly that size.
        pub fn is_well_formed(&self) -> bool {
            self.width > 0
                && self.height > 0
                && self.samples.len() == self.width as usize * self.height as usize
        }

        pub fn same_shape(&self, other: &DepthFrame) -> bool {
            self.width == other.width && self.height == other.height
        }

        pub fn sample(&self, x: u32, y: u32) -> Option<Sample> {
            if x >= self.width || y >= self.height {
                return None;
            }
            self.samples.get((y * self.width + x) as usize).copied()
        }

        /// Keeps every `stride`-th sample along both axes.
        ///
        /// A stride of 0 or 1 returns an identical copy.
        pub fn decimate(&self, stride: u32) -> DepthFrame {
            if stride <= 1 {
                return self.clone();
            }
            let width = self.width.div_ceil(stride);
            let height = self.height.div_ceil(stride);
            let mut samples = Vec::with_capacity((width * height) as usize);
            for y in (0..self.height).step_by(stride as usize) {
                let row = (y * self.width) as usize;
                for x in (0..self.width).step_by(stride as usize) {
                    samples.push(self.samples[row + x as usize]);
                }
            }
            DepthFrame::new(width, height, samples)
        }
    }

    /// The color image delivered alongside depth. Packed RGB, row-major.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ColorFrame {
        pub width: u32,
        pub height: u32,
        pub rgb: Vec<u8>,
    }

    impl ColorFrame {
        pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Self {
            Self { width, height, rgb }
        }
    }
}
