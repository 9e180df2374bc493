use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use time::OffsetDateTime;

use crate::camera::{ExposureSettings, FrameSource};
use crate::config::ConfigProvider;
use crate::detection::TargetPipeline;
use crate::display::DisplaySink;
use crate::models::Frame;
use crate::telemetry::TelemetrySink;

/// Cooperative stop flag shared between the loop and whoever stops it
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Raise `stop` when the process receives Ctrl-C
pub async fn stop_on_ctrl_c(stop: StopSignal) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received, stopping after the current frame");
        stop.request_stop();
    }
}

/// Raise `stop` once `duration` has elapsed
pub async fn stop_after(stop: StopSignal, duration: Duration) {
    tokio::time::sleep(duration).await;
    info!("Run time of {:?} reached, stopping", duration);
    stop.request_stop();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The stop signal was raised
    Signal,
    /// The configured frame limit was reached
    FrameLimit,
    /// The device closed or ran out of frames
    SourceClosed,
    /// Reads kept failing after all retries
    AcquisitionFailed(String),
}

/// Bounded exponential backoff for transient read failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Never retry; the first failure stops the loop
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (starting at 1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

/// Summary of one run of the frame loop
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub frames_processed: u64,
    pub detections: u64,
    pub no_detections: u64,
    pub telemetry_failures: u64,
    pub stop_reason: StopReason,
    pub started_at: OffsetDateTime,
    pub stopped_at: OffsetDateTime,
}

/// Drives acquisition, detection and output, one frame at a time.
///
/// The loop owns its frame source and releases it on every exit path,
/// including exposure failures and acquisition failures.
pub struct FrameLoop<S: FrameSource> {
    source: S,
    config: Box<dyn ConfigProvider>,
    pipeline: TargetPipeline,
    telemetry: Vec<Box<dyn TelemetrySink>>,
    displays: Vec<Box<dyn DisplaySink>>,
    stop: StopSignal,
    retry: RetryPolicy,
    exposure: Option<ExposureSettings>,
    max_frames: Option<u64>,
    state: LoopState,
}

impl<S: FrameSource> FrameLoop<S> {
    pub fn new(source: S, config: Box<dyn ConfigProvider>) -> Self {
        Self {
            source,
            config,
            pipeline: TargetPipeline::new(),
            telemetry: Vec::new(),
            displays: Vec::new(),
            stop: StopSignal::new(),
            retry: RetryPolicy::default(),
            exposure: None,
            max_frames: None,
            state: LoopState::Stopped,
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Exposure applied once before the first frame
    pub fn with_exposure(mut self, exposure: ExposureSettings) -> Self {
        self.exposure = Some(exposure);
        self
    }

    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn add_telemetry(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.telemetry.push(sink);
        self
    }

    pub fn add_display(mut self, sink: Box<dyn DisplaySink>) -> Self {
        self.displays.push(sink);
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Hand back the frame source, e.g. to inspect it after a run
    pub fn into_source(self) -> S {
        self.source
    }

    /// Acquire a frame, retrying transient failures per the retry policy.
    ///
    /// Returns the reason to stop when no frame can be had.
    fn acquire(&mut self) -> std::result::Result<Frame, StopReason> {
        let mut attempt = 0;
        loop {
            match self.source.acquire_frame() {
                Ok(frame) => return Ok(frame),
                Err(e) if e.is_fatal() => {
                    info!("Frame source closed: {}", e);
                    return Err(StopReason::SourceClosed);
                }
                Err(e) if attempt >= self.retry.max_retries => {
                    error!("Frame acquisition failed after {} retries: {}", attempt, e);
                    return Err(StopReason::AcquisitionFailed(e.to_string()));
                }
                Err(e) => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "Frame acquisition failed ({}), retry {}/{} in {:?}",
                        e, attempt, self.retry.max_retries, delay
                    );
                    std::thread::sleep(delay);
                    if self.stop.is_stop_requested() {
                        return Err(StopReason::Signal);
                    }
                }
            }
        }
    }

    /// Run until stopped, the source closes, or acquisition fails for good
    pub fn run(&mut self) -> Result<LoopReport> {
        let started_at = OffsetDateTime::now_utc();

        if let Some(exposure) = self.exposure {
            if let Err(e) = self.source.configure_exposure(&exposure) {
                self.source.release();
                return Err(e).context("Failed to configure camera exposure");
            }
        }

        self.state = LoopState::Running;
        info!("Frame loop running");

        let mut frames_processed = 0u64;
        let mut detections = 0u64;
        let mut no_detections = 0u64;
        let mut telemetry_failures = 0u64;

        let stop_reason = loop {
            if self.stop.is_stop_requested() {
                break StopReason::Signal;
            }
            if self.max_frames.is_some_and(|max| frames_processed >= max) {
                break StopReason::FrameLimit;
            }

            let frame = match self.acquire() {
                Ok(frame) => frame,
                Err(reason) => break reason,
            };

            let config = self.config.current();
            let analysis = self.pipeline.process(&frame, &config);
            if analysis.outcome.is_detected() {
                detections += 1;
            } else {
                no_detections += 1;
            }

            for sink in self.telemetry.iter_mut() {
                if let Err(e) = sink.publish(&analysis.outcome) {
                    telemetry_failures += 1;
                    warn!("Telemetry publish failed: {:#}", e);
                }
            }
            for display in self.displays.iter_mut() {
                if let Err(e) = display.show(frames_processed, &frame, &analysis) {
                    warn!("Display sink failed: {:#}", e);
                }
            }

            frames_processed += 1;
        };

        self.source.release();
        self.state = LoopState::Stopped;

        info!(
            "Frame loop stopped ({:?}) after {} frames: {} detections, {} without target",
            stop_reason, frames_processed, detections, no_detections
        );

        Ok(LoopReport {
            frames_processed,
            detections,
            no_detections,
            telemetry_failures,
            stop_reason,
            started_at,
            stopped_at: OffsetDateTime::now_utc(),
        })
    }
}
