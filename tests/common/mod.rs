mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from aimvision for tests
pub use aimvision::camera::{CameraError, ExposureSettings, FrameSource};
pub use aimvision::{
    BinaryMask, ColorRange, Contour, DistanceModel, FilterConfig, Frame, FrameOutcome, Hsv,
    NoDetectionReason, StaticConfig, TargetPipeline, TrackerConfig,
};
