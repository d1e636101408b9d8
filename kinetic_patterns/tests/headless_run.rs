use kinetic_patterns::core_modules::canvas::HeadlessDisplay;
use kinetic_patterns::core_modules::surface::Display;
use kinetic_patterns::reactive_loop::StopReason;
use kinetic_patterns::synthetic::SyntheticDepthSensor;
use kinetic_patterns::{PatternConfig, StopSignal, run_app};
use std::thread;
use std::time::Duration;

fn small_config() -> PatternConfig {
    PatternConfig {
        resolution: (200, 150),
        sensor_resolution: (80, 60),
        fps_target: 60,
        ..PatternConfig::standard()
    }
}

#[test]
fn synthetic_sensor_drives_a_headless_display() {
    let config = small_config();
    let mut display = HeadlessDisplay::new(config.resolution.0, config.resolution.1).unwrap();
    let sensor = SyntheticDepthSensor::new(80, 60).with_block(12, 6);

    let report = run_app(config, Box::new(sensor), &mut display, StopSignal::new(), Some(20)).unwrap();

    assert_eq!(report.stats.stop_reason, StopReason::FrameLimit);
    assert_eq!(report.stats.frames_rendered, 20);
    assert_eq!(display.frames_presented(), 20);
    assert!(display.canvas().lit_pixels() > 0);

    let sensor = report.sensor.expect("sensor thread joined");
    assert!(sensor.opened);
    assert!(sensor.depth_frames > 0);
    assert_eq!(sensor.failures, 0);
}

#[test]
fn missing_sensor_renders_the_idle_pattern() {
    let config = small_config();
    let mut display = HeadlessDisplay::new(config.resolution.0, config.resolution.1).unwrap();

    let report = run_app(
        config,
        Box::new(SyntheticDepthSensor::unavailable(80, 60)),
        &mut display,
        StopSignal::new(),
        Some(5),
    )
    .unwrap();

    assert_eq!(report.stats.frames_rendered, 5);
    assert_eq!(report.stats.auto_switches, 0);
    assert!(display.canvas().lit_pixels() > 0);
    assert!(!report.sensor.expect("sensor thread joined").opened);
}

#[test]
fn external_stop_ends_an_unbounded_run() {
    let config = small_config();
    let mut display = HeadlessDisplay::new(config.resolution.0, config.resolution.1).unwrap();
    let stop = StopSignal::new();

    let remote = stop.clone();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        remote.raise();
    });

    let report = run_app(
        config,
        Box::new(SyntheticDepthSensor::new(80, 60)),
        &mut display,
        stop,
        None,
    )
    .unwrap();
    stopper.join().unwrap();

    assert_eq!(report.stats.stop_reason, StopReason::StopSignal);
    assert!(report.stats.frames_rendered > 0);
    display.shutdown();
}

#[test]
fn snapshot_can_be_written_after_the_run() {
    let config = small_config();
    let mut display = HeadlessDisplay::new(config.resolution.0, config.resolution.1).unwrap();
    run_app(
        config,
        Box::new(SyntheticDepthSensor::new(80, 60)),
        &mut display,
        StopSignal::new(),
        Some(3),
    )
    .unwrap();

    let path = std::env::temp_dir().join(format!("kinetic_patterns_{}.png", std::process::id()));
    display.canvas().save_png(&path).unwrap();
    let written = image::open(&path).unwrap();
    assert_eq!((written.width(), written.height()), (200, 150));
    let _ = std::fs::remove_file(&path);
}
