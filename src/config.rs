use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::models::ColorRange;

/// Noise filter settings applied to the raw segmentation mask
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// L1 radius of the closing structuring element (1 = 3x3 cross)
    pub close_radius: u8,
    /// Median window radius (2 = 5x5)
    pub median_radius: u32,
    /// Optional Gaussian blur applied after the median pass
    pub blur_sigma: Option<f32>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            close_radius: 1,
            median_radius: 2,
            blur_sigma: None,
        }
    }
}

/// Pinhole-camera constants for distance estimation.
///
/// `focal_length_px` is derived offline from a calibration shot and supplied
/// here as a constant. Distance comes out in the same unit as `target_width`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceModel {
    pub focal_length_px: f64,
    pub target_width: f64,
    /// Distance of the calibration shot that produced `focal_length_px`.
    /// Kept for reference only; the estimator never reads it.
    pub known_distance: Option<f64>,
}

impl Default for DistanceModel {
    fn default() -> Self {
        Self {
            focal_length_px: 1431.0,
            target_width: 3.25,
            known_distance: Some(15.0),
        }
    }
}

/// Everything the per-frame pipeline needs from the outside
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub color: ColorRange,
    pub filter: FilterConfig,
    pub distance: DistanceModel,
}

/// Supplies the active configuration once per frame
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> TrackerConfig;
}

/// Fixed configuration decided at startup
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub TrackerConfig);

impl ConfigProvider for StaticConfig {
    fn current(&self) -> TrackerConfig {
        self.0
    }
}

/// Configuration that can be tuned while the frame loop runs.
///
/// Clones share the same underlying value, so a tuning UI can hold one clone
/// and the loop another.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<TrackerConfig>>,
}

impl SharedConfig {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn set(&self, config: TrackerConfig) {
        self.update(|current| *current = config);
    }

    pub fn update(&self, f: impl FnOnce(&mut TrackerConfig)) {
        // A poisoned lock still holds a plain-old-data config
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl ConfigProvider for SharedConfig {
    fn current(&self) -> TrackerConfig {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}
