// THEORY:
// The sensor flow is the writer half of the engine. It runs on its own thread,
// at the sensor's own cadence, and does exactly three things:
//
// 1.  drives a `SensorDevice`, which delivers frames through `FrameSink`
//     callbacks,
// 2.  runs the `MotionExtractor` inside the depth callback,
// 3.  publishes the newest `MotionSignal` into a single-slot hand-off.
//
// The hand-off is a `tokio::sync::watch` channel: every publish overwrites the
// slot and every read sees the latest value. The render flow never waits on it;
// at worst it sees a signal that is one frame old.
//
// A device that fails to open only ends this flow. The slot then keeps its
// initial "no motion" value and the render flow carries on.

use crate::config::PatternConfig;
use crate::core_modules::depth_frame::depth_frame::{ColorFrame, DepthFrame};
use crate::core_modules::motion_extractor::{MotionExtractor, MotionSignal};
use crate::error::SensorError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pause between two `process_events` calls.
const SENSOR_IDLE: Duration = Duration::from_millis(10);
/// Only every n-th consecutive device failure is logged.
const FAILURE_LOG_EVERY: u64 = 100;

/// A shared, idempotent stop request.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives frames from a sensor device.
pub trait FrameSink {
    fn on_depth_frame(&mut self, frame: DepthFrame);

    fn on_color_frame(&mut self, frame: ColorFrame);
}

/// A depth sensor that pushes frames into a `FrameSink`.
pub trait SensorDevice: Send {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<(), SensorError>;

    /// Delivers whatever frames arrived since the last call. Must return promptly.
    fn process_events(&mut self, sink: &mut dyn FrameSink) -> Result<(), SensorError>;

    /// Releases the device. Must tolerate being called after a failed `open`.
    fn close(&mut self);
}

type MotionSlot = Option<Arc<MotionSignal>>;
type ColorSlot = Option<Arc<ColorFrame>>;

/// Write side of the hand-off.
pub struct MotionSender {
    motion_tx: watch::Sender<MotionSlot>,
    color_tx: watch::Sender<ColorSlot>,
}

impl MotionSender {
    pub fn publish(&self, signal: MotionSignal) {
        self.motion_tx.send_replace(Some(Arc::new(signal)));
    }

    pub fn publish_color(&self, frame: ColorFrame) {
        self.color_tx.send_replace(Some(Arc::new(frame)));
    }
}

/// Read side of the hand-off. Cheap to clone.
#[derive(Clone)]
pub struct MotionFeed {
    motion_rx: watch::Receiver<MotionSlot>,
    color_rx: watch::Receiver<ColorSlot>,
}

impl MotionFeed {
    /// The most recent motion signal, if any sensor frame has been processed.
    pub fn latest(&self) -> Option<Arc<MotionSignal>> {
        self.motion_rx.borrow().clone()
    }

    pub fn latest_color(&self) -> Option<Arc<ColorFrame>> {
        self.color_rx.borrow().clone()
    }
}

/// Creates an empty single-slot hand-off.
pub fn motion_channel() -> (MotionSender, MotionFeed) {
    let (motion_tx, motion_rx) = watch::channel(None);
    let (color_tx, color_rx) = watch::channel(None);
    (
        MotionSender {
            motion_tx,
            color_tx,
        },
        MotionFeed {
            motion_rx,
            color_rx,
        },
    )
}

/// The `FrameSink` that extracts motion and publishes it.
pub struct MotionPublisher {
    extractor: MotionExtractor,
    sender: MotionSender,
    depth_frames: u64,
}

impl MotionPublisher {
    pub fn new(extractor: MotionExtractor, sender: MotionSender) -> Self {
        Self {
            extractor,
            sender,
            depth_frames: 0,
        }
    }

    pub fn depth_frames(&self) -> u64 {
        self.depth_frames
    }
}

impl FrameSink for MotionPublisher {
    fn on_depth_frame(&mut self, frame: DepthFrame) {
        self.depth_frames += 1;
        let signal = self.extractor.process(frame);
        self.sender.publish(signal);
    }

    fn on_color_frame(&mut self, frame: ColorFrame) {
        self.sender.publish_color(frame);
    }
}

/// Summary returned when the sensor thread ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorReport {
    /// Whether the device opened at all.
    pub opened: bool,
    /// Depth frames processed.
    pub depth_frames: u64,
    /// `process_events` calls that failed.
    pub failures: u64,
}

/// Handle to the background sensor thread.
pub struct SensorFlow {
    handle: Option<JoinHandle<SensorReport>>,
    stop: StopSignal,
}

impl SensorFlow {
    /// Starts the sensor thread. The returned feed reads "no motion" until the
    /// first depth frame has been processed.
    pub fn spawn(
        device: Box<dyn SensorDevice>,
        config: &PatternConfig,
        stop: StopSignal,
    ) -> (Self, MotionFeed) {
        let (sender, feed) = motion_channel();
        let extractor = MotionExtractor::new(config.movement_threshold, config.depth_sample_rate);
        let publisher = MotionPublisher::new(extractor, sender);

        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("sensor-flow".to_string())
            .spawn(move || run_sensor(device, publisher, thread_stop));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(%err, "could not start the sensor thread, continuing without motion");
                None
            }
        };

        (Self { handle, stop }, feed)
    }

    /// Raises the stop signal and waits for the thread. Safe to call repeatedly.
    pub fn stop_and_join(&mut self) -> Option<SensorReport> {
        self.stop.raise();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(report) => {
                debug!(?report, "sensor flow joined");
                Some(report)
            }
            Err(_) => {
                error!("sensor flow panicked");
                None
            }
        }
    }
}

impl Drop for SensorFlow {
    fn drop(&mut self) {
        // Best effort shutdown on drop
        self.stop_and_join();
    }
}

fn run_sensor(
    mut device: Box<dyn SensorDevice>,
    mut publisher: MotionPublisher,
    stop: StopSignal,
) -> SensorReport {
    let mut report = SensorReport::default();

    if let Err(err) = device.open() {
        error!(device = device.name(), %err, "sensor failed to start, continuing without motion");
        device.close();
        return report;
    }
    report.opened = true;
    info!(device = device.name(), "sensor started");

    let mut consecutive_failures = 0u64;
    while !stop.is_raised() {
        match device.process_events(&mut publisher) {
            Ok(()) => consecutive_failures = 0,
            Err(err) => {
                report.failures += 1;
                if consecutive_failures % FAILURE_LOG_EVERY == 0 {
                    warn!(device = device.name(), %err, "sensor error, treating as no motion");
                }
                consecutive_failures += 1;
            }
        }
        thread::sleep(SENSOR_IDLE);
    }

    device.close();
    report.depth_frames = publisher.depth_frames();
    info!(device = device.name(), frames = report.depth_frames, "sensor stopped");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct ScriptedDevice {
        frames: Vec<DepthFrame>,
        fail_open: bool,
        closed: Arc<AtomicBool>,
    }

    impl SensorDevice for ScriptedDevice {
        fn name(&self) -> &str {
            "scripted"
        }

        fn open(&mut self) -> Result<(), SensorError> {
            if self.fail_open {
                return Err(SensorError::InitializationFailed("no device".to_string()));
            }
            Ok(())
        }

        fn process_events(&mut self, sink: &mut dyn FrameSink) -> Result<(), SensorError> {
            if self.frames.is_empty() {
                return Err(SensorError::Disconnected("script finished".to_string()));
            }
            sink.on_depth_frame(self.frames.remove(0));
            Ok(())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn wait_until(deadline: Duration, mut ready: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if ready() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        ready()
    }

    #[test]
    fn stop_signal_is_idempotent() {
        let stop = StopSignal::new();
        assert!(!stop.is_raised());
        stop.raise();
        stop.raise();
        assert!(stop.is_raised());
        assert!(stop.clone().is_raised());
    }

    #[test]
    fn feed_returns_latest_published_signal() {
        let (sender, feed) = motion_channel();
        assert!(feed.latest().is_none());
        sender.publish(MotionSignal::still(10, 10));
        let mut moving = MotionSignal::still(10, 10);
        moving.intensity = 7.0;
        sender.publish(moving);
        assert_eq!(feed.latest().map(|s| s.intensity), Some(7.0));
    }

    #[test]
    fn feed_survives_a_dropped_sender() {
        let (sender, feed) = motion_channel();
        sender.publish(MotionSignal::still(4, 4));
        drop(sender);
        assert!(feed.latest().is_some());
    }

    #[test]
    fn publisher_runs_the_extractor() {
        let (sender, feed) = motion_channel();
        let mut publisher = MotionPublisher::new(MotionExtractor::new(30, 1), sender);
        publisher.on_depth_frame(DepthFrame::filled(4, 4, 0));
        publisher.on_depth_frame(DepthFrame::filled(4, 4, 200));
        publisher.on_color_frame(ColorFrame::new(1, 1, vec![1, 2, 3]));
        assert_eq!(publisher.depth_frames(), 2);
        assert_eq!(feed.latest().map(|s| s.intensity), Some(16.0));
        assert_eq!(feed.latest_color().map(|c| c.rgb.clone()), Some(vec![1, 2, 3]));
    }

    #[test]
    fn sensor_thread_publishes_and_stops() {
        let closed = Arc::new(AtomicBool::new(false));
        let device = ScriptedDevice {
            frames: vec![DepthFrame::filled(8, 8, 0), DepthFrame::filled(8, 8, 255)],
            fail_open: false,
            closed: closed.clone(),
        };
        let stop = StopSignal::new();
        let (mut flow, feed) = SensorFlow::spawn(Box::new(device), &PatternConfig::standard(), stop);

        let published = wait_until(Duration::from_secs(2), || {
            feed.latest().map(|s| s.intensity) == Some(64.0)
        });
        assert!(published);

        let report = flow.stop_and_join().expect("thread joins");
        assert!(report.opened);
        assert_eq!(report.depth_frames, 2);
        assert!(closed.load(Ordering::SeqCst));
        assert!(flow.stop_and_join().is_none());
    }

    #[test]
    fn failed_open_leaves_no_motion() {
        let closed = Arc::new(AtomicBool::new(false));
        let device = ScriptedDevice {
            frames: Vec::new(),
            fail_open: true,
            closed: closed.clone(),
        };
        let (mut flow, feed) =
            SensorFlow::spawn(Box::new(device), &PatternConfig::standard(), StopSignal::new());
        let report = flow.stop_and_join().expect("thread joins");
        assert!(!report.opened);
        assert!(feed.latest().is_none());
        assert!(closed.load(Ordering::SeqCst));
    }
}
