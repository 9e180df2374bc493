use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use image::ImageReader;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Frame;

/// Reasons a camera could not deliver a frame.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The device is closed, disconnected, or out of frames.
    #[error("camera closed")]
    Closed,

    /// A single read failed; the device may recover.
    #[error("frame read failed: {0}")]
    Read(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    /// Exposure could not be applied.
    #[error("exposure configuration failed: {0}")]
    Exposure(String),
}

impl CameraError {
    /// Whether retrying the read is pointless
    pub fn is_fatal(&self) -> bool {
        matches!(self, CameraError::Closed)
    }
}

/// Manual exposure used to keep color segmentation stable under changing light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureSettings {
    pub auto: bool,
    pub absolute: u32,
}

impl Default for ExposureSettings {
    fn default() -> Self {
        Self {
            auto: false,
            absolute: 10,
        }
    }
}

/// Supplier of frames for the frame loop
pub trait FrameSource: Send {
    /// Apply exposure settings; called once before the first frame
    fn configure_exposure(&mut self, settings: &ExposureSettings) -> Result<(), CameraError>;

    /// Block until the next frame is available
    fn acquire_frame(&mut self) -> Result<Frame, CameraError>;

    /// Release the device; further reads report `Closed`
    fn release(&mut self);
}

/// Build the `v4l2-ctl` invocation that locks exposure on a Linux camera
pub fn v4l2_exposure_command(device: &Path, settings: &ExposureSettings) -> Command {
    // exposure_auto: 1 = manual, 3 = aperture priority
    let auto_mode = if settings.auto { 3 } else { 1 };
    let mut cmd = Command::new("v4l2-ctl");
    cmd.arg("-d")
        .arg(device)
        .arg("-c")
        .arg(format!("exposure_auto={}", auto_mode));
    if !settings.auto {
        cmd.arg("-c").arg(format!("exposure_absolute={}", settings.absolute));
    }
    cmd
}

/// Run `v4l2-ctl` to apply exposure settings to a device
pub fn apply_v4l2_exposure(device: &Path, settings: &ExposureSettings) -> Result<(), CameraError> {
    let status = v4l2_exposure_command(device, settings).status()?;
    if !status.success() {
        return Err(CameraError::Exposure(format!(
            "v4l2-ctl exited with {} for {}",
            status,
            device.display()
        )));
    }
    info!("Exposure locked on {} ({:?})", device.display(), settings);
    Ok(())
}

/// Locks exposure on a V4L2 device, then hands frames through from `inner`.
///
/// Used when frames reach the process by another route (e.g. a capture
/// daemon writing stills) but the camera itself still needs its exposure set.
pub struct V4l2ExposureLock<S> {
    inner: S,
    device: PathBuf,
}

impl<S: FrameSource> V4l2ExposureLock<S> {
    pub fn new(inner: S, device: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            device: device.into(),
        }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: FrameSource> FrameSource for V4l2ExposureLock<S> {
    fn configure_exposure(&mut self, settings: &ExposureSettings) -> Result<(), CameraError> {
        apply_v4l2_exposure(&self.device, settings)?;
        self.inner.configure_exposure(settings)
    }

    fn acquire_frame(&mut self) -> Result<Frame, CameraError> {
        self.inner.acquire_frame()
    }

    fn release(&mut self) {
        self.inner.release();
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn configure_exposure(&mut self, settings: &ExposureSettings) -> Result<(), CameraError> {
        (**self).configure_exposure(settings)
    }

    fn acquire_frame(&mut self) -> Result<Frame, CameraError> {
        (**self).acquire_frame()
    }

    fn release(&mut self) {
        (**self).release();
    }
}

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Frames read from a directory of still images, in file-name order.
///
/// Stands in for a live camera: the end of the sequence reports `Closed`,
/// and an optional frame interval paces delivery like a real device.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    next: usize,
    frame_interval: Option<Duration>,
    last_frame_at: Option<Instant>,
    released: bool,
}

impl ImageSequenceSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, CameraError> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_frame {
                frames.push(path);
            }
        }
        frames.sort();

        info!("Loaded {} frames from {}", frames.len(), dir.as_ref().display());

        Ok(Self {
            frames,
            next: 0,
            frame_interval: None,
            last_frame_at: None,
            released: false,
        })
    }

    /// Deliver frames no faster than `fps`.
    ///
    /// A rate that is not a positive finite number, or whose period does not
    /// fit in a `Duration`, leaves delivery unpaced.
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_interval = if fps > 0.0 {
            Duration::try_from_secs_f64(1.0 / fps).ok()
        } else {
            None
        };
        if self.frame_interval.is_none() {
            warn!("Ignoring frame rate {}; frames are delivered unpaced", fps);
        }
        self
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame_at) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn configure_exposure(&mut self, settings: &ExposureSettings) -> Result<(), CameraError> {
        debug!("Image sequence ignores exposure settings {:?}", settings);
        Ok(())
    }

    fn acquire_frame(&mut self) -> Result<Frame, CameraError> {
        if self.released {
            return Err(CameraError::Closed);
        }
        let Some(path) = self.frames.get(self.next).cloned() else {
            return Err(CameraError::Closed);
        };
        self.next += 1;
        self.pace();

        let frame = ImageReader::open(&path)?.decode()?.to_rgb8();
        Ok(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }
}
