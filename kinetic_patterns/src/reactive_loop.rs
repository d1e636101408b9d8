// THEORY:
// The `ReactiveLoop` is the render flow. It owns the `PatternRenderer` and
// drives one display at a fixed cadence. Every iteration runs the same
// sequence:
//
// 1.  read the newest `MotionSignal` from the hand-off (or fall back to "no
//     motion" at the frame centre),
// 2.  smooth it over the last few signals when configured to,
// 3.  rescale the centroid from sensor pixels into display pixels,
// 4.  render one frame, which may auto-switch the pattern,
// 5.  present, then dispatch window input,
// 6.  sleep for whatever is left of the frame budget.
//
// Pacing is "measure, then sleep the remainder". A slow frame is never
// skipped; the loop simply runs late.
//
// The stop signal and the optional frame limit are only checked between
// frames, so a frame that has started is always finished and presented.

use crate::config::PatternConfig;
use crate::core_modules::motion_extractor::{MotionSignal, normalize_intensity};
use crate::core_modules::pattern_renderer::{PatternKind, PatternRenderer, SwitchCause};
use crate::core_modules::surface::{Display, InputEvent};
use crate::error::RenderError;
use crate::sensor_flow::{MotionFeed, StopSignal};
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Rescales a sensor-space point into display space, truncating per axis.
pub fn remap_centroid(centroid: (i32, i32), sensor: (u32, u32), display: (u32, u32)) -> (i32, i32) {
    let scale = |value: i32, from: u32, to: u32| {
        if from == 0 {
            return (to / 2) as i32;
        }
        (value as f64 * to as f64 / from as f64) as i32
    };
    (
        scale(centroid.0, sensor.0, display.0),
        scale(centroid.1, sensor.1, display.1),
    )
}

#[derive(Debug, Clone, Copy)]
struct MotionSample {
    x: f64,
    y: f64,
    intensity: f64,
}

/// Moving average over the most recent motion samples.
#[derive(Debug, Clone)]
pub struct MotionSmoother {
    window: usize,
    history: VecDeque<MotionSample>,
}

impl MotionSmoother {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            history: VecDeque::with_capacity(window),
        }
    }

    /// Adds a sample and returns the averaged centroid and intensity.
    pub fn push(&mut self, centroid: (f64, f64), intensity: f64) -> ((f64, f64), f64) {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(MotionSample {
            x: centroid.0,
            y: centroid.1,
            intensity,
        });

        let count = self.history.len() as f64;
        let (sum_x, sum_y, sum_intensity) = self
            .history
            .iter()
            .fold((0.0, 0.0, 0.0), |(x, y, i), sample| {
                (x + sample.x, y + sample.y, i + sample.intensity)
            });
        ((sum_x / count, sum_y / count), sum_intensity / count)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

/// Holds a loop to a fixed frame budget by sleeping off the unused remainder.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    frame_started: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            frame_started: Instant::now(),
        }
    }

    pub fn start_frame(&mut self) {
        self.frame_started = Instant::now();
    }

    /// Sleeps until the frame budget is used up. Returns how long it slept.
    pub fn finish_frame(&mut self) -> Duration {
        let elapsed = self.frame_started.elapsed();
        match self.interval.checked_sub(elapsed) {
            Some(remainder) if !remainder.is_zero() => {
                thread::sleep(remainder);
                remainder
            }
            _ => Duration::ZERO,
        }
    }
}

/// Why `ReactiveLoop::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The window asked to quit.
    Input,
    /// The shared stop signal was raised.
    StopSignal,
    /// The configured number of frames was rendered.
    FrameLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStats {
    pub frames_rendered: u64,
    /// Pattern changes from both input and motion.
    pub pattern_switches: u64,
    pub auto_switches: u64,
    pub final_pattern: PatternKind,
    pub stop_reason: StopReason,
}

/// Whether the loop should keep going after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Quit,
}

pub struct ReactiveLoop {
    config: PatternConfig,
    renderer: PatternRenderer,
    smoother: MotionSmoother,
    pacer: FramePacer,
    frames_rendered: u64,
    pattern_switches: u64,
    auto_switches: u64,
}

impl ReactiveLoop {
    pub fn new(config: PatternConfig, renderer: PatternRenderer) -> Self {
        Self {
            smoother: MotionSmoother::new(config.motion_smoothing),
            pacer: FramePacer::new(config.frame_interval()),
            config,
            renderer,
            frames_rendered: 0,
            pattern_switches: 0,
            auto_switches: 0,
        }
    }

    pub fn from_config(config: PatternConfig) -> Self {
        let renderer = PatternRenderer::from_entropy(config.clone());
        Self::new(config, renderer)
    }

    pub fn renderer(&self) -> &PatternRenderer {
        &self.renderer
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Turns the latest signal into a display-space centroid and a normalized intensity.
    pub fn motion_input(&mut self, latest: Option<&MotionSignal>) -> ((i32, i32), f64) {
        let sensor = self.config.sensor_resolution;
        let (centroid, raw) = match latest {
            Some(signal) => (signal.centroid, signal.intensity),
            None => (((sensor.0 / 2) as i32, (sensor.1 / 2) as i32), 0.0),
        };
        let intensity = normalize_intensity(raw, self.config.intensity_divisor);

        let ((x, y), intensity) = self
            .smoother
            .push((centroid.0 as f64, centroid.1 as f64), intensity);
        let centroid = remap_centroid((x as i32, y as i32), sensor, self.config.resolution);
        (centroid, intensity)
    }

    /// Renders, presents and handles input for a single frame. Does not pace.
    pub fn step<D: Display>(
        &mut self,
        display: &mut D,
        latest: Option<&MotionSignal>,
    ) -> Result<FrameOutcome, RenderError> {
        let (centroid, intensity) = self.motion_input(latest);
        self.renderer.update_motion(centroid, intensity);

        let report = self.renderer.render_frame(display.surface_mut())?;
        self.frames_rendered += 1;
        if report.auto_switched {
            self.auto_switches += 1;
            self.pattern_switches += 1;
        }

        display.present()?;

        for event in display.poll_events() {
            match event {
                InputEvent::Quit | InputEvent::Escape => {
                    debug!(?event, "quit requested");
                    return Ok(FrameOutcome::Quit);
                }
                InputEvent::NextPattern => {
                    self.renderer.advance(SwitchCause::Manual);
                    self.pattern_switches += 1;
                }
            }
        }
        Ok(FrameOutcome::Continue)
    }

    /// Runs frames until input quits, `stop` is raised, or `frame_limit` frames have run.
    ///
    /// A quit from input also raises `stop` so the sensor flow winds down.
    pub fn run<D: Display>(
        &mut self,
        display: &mut D,
        feed: &MotionFeed,
        stop: &StopSignal,
        frame_limit: Option<u64>,
    ) -> Result<LoopStats, RenderError> {
        info!(
            pattern = self.renderer.pattern().name(),
            fps = self.config.fps_target,
            "render loop started"
        );

        let stop_reason = loop {
            if stop.is_raised() {
                break StopReason::StopSignal;
            }
            if frame_limit.is_some_and(|limit| self.frames_rendered >= limit) {
                break StopReason::FrameLimit;
            }

            self.pacer.start_frame();
            let latest = feed.latest();
            if self.step(display, latest.as_deref())? == FrameOutcome::Quit {
                stop.raise();
                break StopReason::Input;
            }
            self.pacer.finish_frame();
        };

        let stats = LoopStats {
            frames_rendered: self.frames_rendered,
            pattern_switches: self.pattern_switches,
            auto_switches: self.auto_switches,
            final_pattern: self.renderer.pattern(),
            stop_reason,
        };
        info!(
            frames = stats.frames_rendered,
            switches = stats.pattern_switches,
            pattern = stats.final_pattern.name(),
            reason = ?stats.stop_reason,
            "render loop stopped"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::canvas::Canvas;
    use crate::sensor_flow::motion_channel;

    struct ScriptedDisplay {
        canvas: Canvas,
        events: VecDeque<Vec<InputEvent>>,
        presented: u64,
        fail_present: bool,
    }

    impl ScriptedDisplay {
        fn new(events: Vec<Vec<InputEvent>>) -> Self {
            Self {
                canvas: Canvas::new(800, 600).unwrap(),
                events: events.into(),
                presented: 0,
                fail_present: false,
            }
        }
    }

    impl Display for ScriptedDisplay {
        type Target = Canvas;

        fn surface_mut(&mut self) -> &mut Canvas {
            &mut self.canvas
        }

        fn present(&mut self) -> Result<(), RenderError> {
            if self.fail_present {
                return Err(RenderError::Present("window gone".to_string()));
            }
            self.presented += 1;
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<InputEvent> {
            self.events.pop_front().unwrap_or_default()
        }

        fn shutdown(&mut self) {}
    }

    fn fast_config() -> PatternConfig {
        PatternConfig {
            fps_target: 1000,
            ..PatternConfig::standard()
        }
    }

    fn fast_loop() -> ReactiveLoop {
        let config = fast_config();
        ReactiveLoop::new(config.clone(), PatternRenderer::seeded(config, 3))
    }

    fn signal(centroid: (i32, i32), intensity: f64) -> MotionSignal {
        let mut signal = MotionSignal::still(640, 480);
        signal.centroid = centroid;
        signal.intensity = intensity;
        signal
    }

    #[test]
    fn sensor_centre_maps_to_display_centre() {
        assert_eq!(remap_centroid((320, 240), (640, 480), (800, 600)), (400, 300));
        assert_eq!(remap_centroid((0, 0), (640, 480), (800, 600)), (0, 0));
        assert_eq!(remap_centroid((639, 479), (640, 480), (640, 480)), (639, 479));
    }

    #[test]
    fn remap_truncates() {
        assert_eq!(remap_centroid((1, 1), (640, 480), (800, 600)), (1, 1));
        assert_eq!(remap_centroid((3, 3), (640, 480), (800, 600)), (3, 3));
        assert_eq!(remap_centroid((100, 100), (640, 480), (320, 240)), (50, 50));
    }

    #[test]
    fn missing_signal_is_no_motion_at_the_centre() {
        let mut reactive = fast_loop();
        assert_eq!(reactive.motion_input(None), ((400, 300), 0.0));
    }

    #[test]
    fn signal_is_normalized_and_remapped() {
        let mut reactive = fast_loop();
        let (centroid, intensity) = reactive.motion_input(Some(&signal((160, 120), 5_000.0)));
        assert_eq!(centroid, (200, 150));
        assert_eq!(intensity, 0.5);
    }

    #[test]
    fn smoother_averages_the_window() {
        let mut smoother = MotionSmoother::new(3);
        smoother.push((0.0, 0.0), 0.0);
        smoother.push((30.0, 60.0), 0.6);
        let (centroid, intensity) = smoother.push((60.0, 0.0), 0.3);
        assert_eq!(centroid, (30.0, 20.0));
        assert!((intensity - 0.3).abs() < 1e-12);

        let (centroid, _) = smoother.push((90.0, 0.0), 0.0);
        assert_eq!(centroid, (60.0, 20.0));
    }

    #[test]
    fn smoother_of_one_is_the_identity() {
        let mut smoother = MotionSmoother::new(1);
        smoother.push((5.0, 5.0), 1.0);
        assert_eq!(smoother.push((7.0, 9.0), 0.25), ((7.0, 9.0), 0.25));
    }

    #[test]
    fn pacer_sleeps_the_remainder() {
        let mut pacer = FramePacer::new(Duration::from_millis(20));
        pacer.start_frame();
        let started = Instant::now();
        let slept = pacer.finish_frame();
        assert!(slept > Duration::ZERO);
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn pacer_never_sleeps_after_a_slow_frame() {
        let mut pacer = FramePacer::new(Duration::from_millis(1));
        pacer.start_frame();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(pacer.finish_frame(), Duration::ZERO);
    }

    #[test]
    fn escape_stops_the_loop_and_raises_stop() {
        let mut reactive = fast_loop();
        let mut display = ScriptedDisplay::new(vec![vec![], vec![], vec![InputEvent::Escape]]);
        let (_sender, feed) = motion_channel();
        let stop = StopSignal::new();

        let stats = reactive.run(&mut display, &feed, &stop, None).unwrap();
        assert_eq!(stats.stop_reason, StopReason::Input);
        assert_eq!(stats.frames_rendered, 3);
        assert_eq!(display.presented, 3);
        assert!(stop.is_raised());
    }

    #[test]
    fn quit_event_stops_the_loop() {
        let mut reactive = fast_loop();
        let mut display = ScriptedDisplay::new(vec![vec![InputEvent::Quit]]);
        let (_sender, feed) = motion_channel();
        let stats = reactive
            .run(&mut display, &feed, &StopSignal::new(), None)
            .unwrap();
        assert_eq!(stats.frames_rendered, 1);
        assert_eq!(stats.stop_reason, StopReason::Input);
    }

    #[test]
    fn next_pattern_advances_manually() {
        let mut reactive = fast_loop();
        let mut display = ScriptedDisplay::new(vec![
            vec![InputEvent::NextPattern],
            vec![InputEvent::NextPattern],
        ]);
        let (_sender, feed) = motion_channel();
        let stats = reactive
            .run(&mut display, &feed, &StopSignal::new(), Some(4))
            .unwrap();
        assert_eq!(stats.stop_reason, StopReason::FrameLimit);
        assert_eq!(stats.frames_rendered, 4);
        assert_eq!(stats.pattern_switches, 2);
        assert_eq!(stats.auto_switches, 0);
        assert_eq!(stats.final_pattern, PatternKind::ParticleSystem);
    }

    #[test]
    fn raised_stop_renders_nothing() {
        let mut reactive = fast_loop();
        let mut display = ScriptedDisplay::new(Vec::new());
        let (_sender, feed) = motion_channel();
        let stop = StopSignal::new();
        stop.raise();
        let stats = reactive.run(&mut display, &feed, &stop, None).unwrap();
        assert_eq!(stats.stop_reason, StopReason::StopSignal);
        assert_eq!(stats.frames_rendered, 0);
    }

    #[test]
    fn strong_motion_walks_the_patterns() {
        let mut reactive = fast_loop();
        let mut display = ScriptedDisplay::new(Vec::new());
        let (sender, feed) = motion_channel();
        sender.publish(signal((320, 240), 9_000.0));

        let stats = reactive
            .run(&mut display, &feed, &StopSignal::new(), Some(2))
            .unwrap();
        assert_eq!(stats.auto_switches, 2);
        assert_eq!(stats.final_pattern, PatternKind::ParticleSystem);
    }

    #[test]
    fn present_failure_is_returned() {
        let mut reactive = fast_loop();
        let mut display = ScriptedDisplay::new(Vec::new());
        display.fail_present = true;
        let (_sender, feed) = motion_channel();
        let result = reactive.run(&mut display, &feed, &StopSignal::new(), Some(5));
        assert!(matches!(result, Err(RenderError::Present(_))));
    }
}
