use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use aimvision::camera::{CameraError, ExposureSettings, FrameSource};
use aimvision::telemetry::TelemetrySink;
use aimvision::{BinaryMask, FrameOutcome, Frame, StopSignal};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

pub const TARGET_GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BACKGROUND_BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Mask with a filled axis-aligned rectangle covering `x0..=x1`, `y0..=y1`
pub fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> BinaryMask {
    GrayImage::from_fn(width, height, |x, y| {
        if (x0..=x1).contains(&x) && (y0..=y1).contains(&y) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Mask with one filled circle
pub fn circle_mask(width: u32, height: u32, center: (i32, i32), radius: i32) -> BinaryMask {
    let mut mask = GrayImage::new(width, height);
    draw_filled_circle_mut(&mut mask, center, radius, Luma([255u8]));
    mask
}

/// Black frame with one filled circle of `color`
pub fn circle_frame(
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: Rgb<u8>,
) -> Frame {
    let mut frame = RgbImage::from_pixel(width, height, BACKGROUND_BLACK);
    draw_filled_circle_mut(&mut frame, center, radius, color);
    frame
}

/// Black frame with nothing to find
pub fn empty_frame(width: u32, height: u32) -> Frame {
    RgbImage::from_pixel(width, height, BACKGROUND_BLACK)
}

/// Polygon contour for an axis-aligned rectangle with the given corner and size
pub fn rect_contour(x: i32, y: i32, width: i32, height: i32) -> aimvision::Contour {
    aimvision::Contour::from_coords(&[
        (x, y),
        (x + width, y),
        (x + width, y + height),
        (x, y + height),
    ])
}

/// Filter settings that leave the mask untouched
pub fn no_filtering() -> aimvision::FilterConfig {
    aimvision::FilterConfig {
        close_radius: 0,
        median_radius: 0,
        blur_sigma: None,
    }
}

/// Deterministic pseudo-random speckle mask (xorshift)
pub fn speckle_mask(width: u32, height: u32, seed: u32, density_percent: u32) -> BinaryMask {
    let mut state = seed.max(1);
    GrayImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        if state % 100 < density_percent {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Frame source that replays a fixed script of results
pub struct ScriptedSource {
    script: VecDeque<Result<Frame, CameraError>>,
    pub acquisitions: usize,
    pub released: bool,
    pub exposure: Option<ExposureSettings>,
    pub fail_exposure: bool,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Frame, CameraError>>) -> Self {
        Self {
            script: script.into(),
            acquisitions: 0,
            released: false,
            exposure: None,
            fail_exposure: false,
        }
    }

    pub fn frames(frames: Vec<Frame>) -> Self {
        Self::new(frames.into_iter().map(Ok).collect())
    }
}

impl FrameSource for ScriptedSource {
    fn configure_exposure(&mut self, settings: &ExposureSettings) -> Result<(), CameraError> {
        if self.fail_exposure {
            return Err(CameraError::Exposure("scripted failure".to_string()));
        }
        self.exposure = Some(*settings);
        Ok(())
    }

    fn acquire_frame(&mut self) -> Result<Frame, CameraError> {
        self.acquisitions += 1;
        if self.released {
            return Err(CameraError::Closed);
        }
        self.script.pop_front().unwrap_or(Err(CameraError::Closed))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Telemetry sink that remembers every outcome it was given
#[derive(Clone, Default)]
pub struct RecordingTelemetry {
    pub outcomes: Arc<Mutex<Vec<FrameOutcome>>>,
    pub fail: bool,
    pub stop_after_first: Option<StopSignal>,
}

impl RecordingTelemetry {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<FrameOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn publish(&mut self, outcome: &FrameOutcome) -> anyhow::Result<()> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        if let Some(stop) = &self.stop_after_first {
            stop.request_stop();
        }
        if self.fail {
            anyhow::bail!("telemetry link down");
        }
        Ok(())
    }
}
