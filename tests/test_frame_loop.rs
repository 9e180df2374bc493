mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aimvision::frame_loop::stop_after;
use aimvision::{
    ConfigProvider, FrameLoop, LoopState, RetryPolicy, SharedConfig, StopReason, StopSignal,
};
use common::*;

fn no_wait_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    }
}

fn target_frame() -> Frame {
    circle_frame(160, 120, (100, 60), 15, TARGET_GREEN)
}

#[test]
fn runs_until_source_closes_and_releases_it() -> anyhow::Result<()> {
    let source =
        ScriptedSource::frames(vec![target_frame(), empty_frame(160, 120), target_frame()]);
    let telemetry = RecordingTelemetry::default();

    let mut frame_loop = FrameLoop::new(source, Box::new(StaticConfig::default()))
        .add_telemetry(Box::new(telemetry.clone()));
    let report = frame_loop.run()?;

    assert_eq!(report.stop_reason, StopReason::SourceClosed);
    assert_eq!(report.frames_processed, 3);
    assert_eq!(report.detections, 2);
    assert_eq!(report.no_detections, 1);
    assert!(report.stopped_at >= report.started_at);
    assert_eq!(frame_loop.state(), LoopState::Stopped);

    let outcomes = telemetry.recorded();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_detected());
    assert_eq!(
        outcomes[1],
        FrameOutcome::NoDetection(NoDetectionReason::NoContours)
    );
    let offset = outcomes[2].estimate().unwrap().offset_x;
    assert!((offset - 20.0).abs() <= 1.0, "offset {}", offset);

    assert!(frame_loop.into_source().released);
    Ok(())
}

#[test]
fn raised_stop_signal_prevents_any_acquisition() -> anyhow::Result<()> {
    let stop = StopSignal::new();
    stop.request_stop();

    let mut frame_loop = FrameLoop::new(
        ScriptedSource::frames(vec![target_frame()]),
        Box::new(StaticConfig::default()),
    )
    .with_stop_signal(stop);
    let report = frame_loop.run()?;

    assert_eq!(report.stop_reason, StopReason::Signal);
    assert_eq!(report.frames_processed, 0);

    let source = frame_loop.into_source();
    assert_eq!(source.acquisitions, 0);
    assert!(source.released);
    Ok(())
}

#[test]
fn stop_is_checked_between_frames_not_mid_frame() -> anyhow::Result<()> {
    let stop = StopSignal::new();
    let telemetry = RecordingTelemetry {
        stop_after_first: Some(stop.clone()),
        ..RecordingTelemetry::default()
    };

    let mut frame_loop = FrameLoop::new(
        ScriptedSource::frames(vec![target_frame(), target_frame(), target_frame()]),
        Box::new(StaticConfig::default()),
    )
    .with_stop_signal(stop)
    .add_telemetry(Box::new(telemetry.clone()));
    let report = frame_loop.run()?;

    // The frame in flight still finishes and is published
    assert_eq!(report.frames_processed, 1);
    assert_eq!(telemetry.recorded().len(), 1);
    assert_eq!(report.stop_reason, StopReason::Signal);
    Ok(())
}

#[test]
fn transient_read_failures_are_retried() -> anyhow::Result<()> {
    let source = ScriptedSource::new(vec![
        Ok(target_frame()),
        Err(CameraError::Read("usb hiccup".to_string())),
        Err(CameraError::Read("usb hiccup".to_string())),
        Ok(target_frame()),
    ]);

    let mut frame_loop = FrameLoop::new(source, Box::new(StaticConfig::default()))
        .with_retry_policy(no_wait_retries(2));
    let report = frame_loop.run()?;

    assert_eq!(report.frames_processed, 2);
    assert_eq!(report.stop_reason, StopReason::SourceClosed);
    Ok(())
}

#[test]
fn persistent_read_failures_stop_the_loop() -> anyhow::Result<()> {
    let failures = (0..10)
        .map(|_| Err(CameraError::Read("sensor timeout".to_string())))
        .collect();

    let mut frame_loop = FrameLoop::new(
        ScriptedSource::new(failures),
        Box::new(StaticConfig::default()),
    )
    .with_retry_policy(no_wait_retries(3));
    let report = frame_loop.run()?;

    assert!(matches!(
        report.stop_reason,
        StopReason::AcquisitionFailed(ref msg) if msg.contains("sensor timeout")
    ));
    assert_eq!(report.frames_processed, 0);

    let source = frame_loop.into_source();
    // First attempt plus three retries
    assert_eq!(source.acquisitions, 4);
    assert!(source.released);
    Ok(())
}

#[test]
fn failed_publishes_do_not_stop_the_loop() -> anyhow::Result<()> {
    let failing = RecordingTelemetry::failing();
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::frames(vec![target_frame(), target_frame()]),
        Box::new(StaticConfig::default()),
    )
    .add_telemetry(Box::new(failing.clone()));
    let report = frame_loop.run()?;

    assert_eq!(report.frames_processed, 2);
    assert_eq!(report.telemetry_failures, 2);
    assert_eq!(failing.recorded().len(), 2);
    Ok(())
}

#[test]
fn exposure_is_applied_once_before_frames() -> anyhow::Result<()> {
    let settings = ExposureSettings { auto: false, absolute: 25 };
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::frames(vec![target_frame()]),
        Box::new(StaticConfig::default()),
    )
    .with_exposure(settings);
    frame_loop.run()?;

    assert_eq!(frame_loop.into_source().exposure, Some(settings));
    Ok(())
}

#[test]
fn exposure_failure_releases_the_source() {
    let mut source = ScriptedSource::frames(vec![target_frame()]);
    source.fail_exposure = true;

    let mut frame_loop = FrameLoop::new(source, Box::new(StaticConfig::default()))
        .with_exposure(ExposureSettings::default());
    let err = frame_loop.run().unwrap_err();

    assert!(format!("{:#}", err).contains("exposure"));
    let source = frame_loop.into_source();
    assert!(source.released);
    assert_eq!(source.acquisitions, 0);
}

#[test]
fn frame_limit_stops_the_loop() -> anyhow::Result<()> {
    let frames = (0..5).map(|_| target_frame()).collect();
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::frames(frames),
        Box::new(StaticConfig::default()),
    )
    .with_max_frames(2);
    let report = frame_loop.run()?;

    assert_eq!(report.stop_reason, StopReason::FrameLimit);
    assert_eq!(report.frames_processed, 2);
    Ok(())
}

struct CountingConfig {
    calls: Arc<AtomicUsize>,
}

impl ConfigProvider for CountingConfig {
    fn current(&self) -> TrackerConfig {
        self.calls.fetch_add(1, Ordering::SeqCst);
        TrackerConfig::default()
    }
}

#[test]
fn configuration_is_read_once_per_frame() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = CountingConfig { calls: calls.clone() };

    let frames = (0..3).map(|_| target_frame()).collect();
    FrameLoop::new(ScriptedSource::frames(frames), Box::new(provider)).run()?;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn shared_config_updates_are_visible_to_the_loop_side() {
    let tuning = SharedConfig::default();
    let loop_side = tuning.clone();
    assert_eq!(loop_side.current(), TrackerConfig::default());

    tuning.update(|cfg| cfg.color.lower = Hsv::new(0, 0, 0));
    assert_eq!(loop_side.current().color.lower, Hsv::new(0, 0, 0));

    let mut replacement = TrackerConfig::default();
    replacement.distance.focal_length_px = 803.0;
    tuning.set(replacement);
    assert_eq!(loop_side.current().distance.focal_length_px, 803.0);
}

#[test]
fn backoff_doubles_up_to_the_cap() {
    let policy = RetryPolicy {
        max_retries: 10,
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_millis(300),
    };
    assert_eq!(policy.backoff(1), Duration::from_millis(50));
    assert_eq!(policy.backoff(2), Duration::from_millis(100));
    assert_eq!(policy.backoff(3), Duration::from_millis(200));
    assert_eq!(policy.backoff(4), Duration::from_millis(300));
    assert_eq!(policy.backoff(40), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn stop_after_raises_the_signal_when_time_elapses() {
    let stop = StopSignal::new();
    let handle = tokio::spawn(stop_after(stop.clone(), Duration::from_secs(5)));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!stop.is_stop_requested());

    handle.await.unwrap();
    assert!(stop.is_stop_requested());
}
