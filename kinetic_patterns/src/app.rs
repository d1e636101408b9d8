// THEORY:
// `run_app` wires the two flows together: it starts the sensor flow, hands its
// motion feed to a fresh `ReactiveLoop`, and runs the loop against the given
// display on the calling thread.
//
// Teardown lives in `Session`, a guard whose `Drop` raises the stop signal,
// joins the sensor thread and shuts the display down. It therefore runs on a
// clean exit, on a render error and while unwinding from a panic alike.

use crate::config::PatternConfig;
use crate::core_modules::surface::Display;
use crate::error::RenderError;
use crate::reactive_loop::{LoopStats, ReactiveLoop};
use crate::sensor_flow::{SensorDevice, SensorFlow, SensorReport, StopSignal};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct AppReport {
    pub stats: LoopStats,
    /// `None` when the sensor thread could not be started or panicked.
    pub sensor: Option<SensorReport>,
}

struct Session<'a, D: Display> {
    flow: SensorFlow,
    display: &'a mut D,
    stop: StopSignal,
    closed: bool,
}

impl<D: Display> Session<'_, D> {
    fn close(&mut self) -> Option<SensorReport> {
        self.stop.raise();
        let report = self.flow.stop_and_join();
        if !self.closed {
            self.display.shutdown();
            self.closed = true;
        }
        report
    }
}

impl<D: Display> Drop for Session<'_, D> {
    fn drop(&mut self) {
        // Best effort shutdown on drop
        self.close();
    }
}

/// Runs the reactive loop against `display` until input quits, `stop` is
/// raised, or `frame_limit` frames have been rendered.
pub fn run_app<D: Display>(
    config: PatternConfig,
    device: Box<dyn SensorDevice>,
    display: &mut D,
    stop: StopSignal,
    frame_limit: Option<u64>,
) -> Result<AppReport, RenderError> {
    info!(
        device = device.name(),
        resolution = ?config.resolution,
        max_particles = config.max_particles,
        "starting pattern engine"
    );

    let (flow, feed) = SensorFlow::spawn(device, &config, stop.clone());
    let mut session = Session {
        flow,
        display,
        stop: stop.clone(),
        closed: false,
    };

    let mut reactive = ReactiveLoop::from_config(config);
    let stats = reactive.run(&mut *session.display, &feed, &stop, frame_limit)?;
    let sensor = session.close();

    Ok(AppReport { stats, sensor })
}
