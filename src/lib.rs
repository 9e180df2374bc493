pub mod camera;
pub mod config;
pub mod detection;
pub mod display;
pub mod frame_loop;
pub mod models;
pub mod telemetry;

pub use models::{
    BinaryMask, ColorRange, Contour, Frame, FrameOutcome, Hsv, Moments, NoDetectionReason,
    RectSize, TargetEstimate,
};
pub use config::{
    ConfigProvider, DistanceModel, FilterConfig, SharedConfig, StaticConfig, TrackerConfig,
};
pub use detection::{FrameAnalysis, TargetPipeline};
pub use frame_loop::{FrameLoop, LoopReport, LoopState, RetryPolicy, StopReason, StopSignal};
