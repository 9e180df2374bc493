pub mod segmentation;
pub mod preprocessing;
pub mod contours;
pub mod selection;
pub mod locate;
pub mod distance;

use log::debug;

use crate::config::TrackerConfig;
use crate::models::{BinaryMask, Contour, Frame, FrameOutcome, NoDetectionReason};

/// Everything produced while processing one frame.
///
/// The masks and selected contour are kept so display sinks can render them;
/// nothing here outlives the frame iteration.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub mask: BinaryMask,
    pub filtered: BinaryMask,
    pub contour_count: usize,
    pub selected: Option<Contour>,
    pub outcome: FrameOutcome,
}

/// Per-frame target detection: segment, filter, extract, select, locate, range.
///
/// Holds no state between frames; the configuration is passed in on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetPipeline;

impl TargetPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Run the full pipeline on a color frame
    pub fn process(&self, frame: &Frame, config: &TrackerConfig) -> FrameAnalysis {
        let mask = segmentation::segment(frame, &config.color);
        debug!(
            "segmented {}x{} frame: {} pixels in range",
            frame.width(),
            frame.height(),
            segmentation::foreground_count(&mask)
        );
        self.process_mask(mask, config)
    }

    /// Run everything after segmentation on an existing mask
    pub fn process_mask(&self, mask: BinaryMask, config: &TrackerConfig) -> FrameAnalysis {
        let filtered = preprocessing::filter_mask(&mask, &config.filter);
        let all_contours = contours::extract_contours(&filtered);
        debug!("found {} contours", all_contours.len());

        let contour_count = all_contours.len();
        let Some((idx, selected)) = selection::select_largest(&all_contours) else {
            return FrameAnalysis {
                mask,
                filtered,
                contour_count,
                selected: None,
                outcome: FrameOutcome::NoDetection(NoDetectionReason::NoContours),
            };
        };
        let selected = selected.clone();

        let outcome = match locate::locate(&selected, filtered.width(), filtered.height()) {
            Some(mut estimate) => {
                estimate.distance = estimate
                    .rect
                    .as_ref()
                    .and_then(|rect| distance::estimate_distance(&config.distance, rect));
                debug!(
                    "selected contour {} (area {:.1}): centroid ({:.1}, {:.1}), offset {:.1}",
                    idx, estimate.area, estimate.centroid.0, estimate.centroid.1, estimate.offset_x
                );
                FrameOutcome::Detected(estimate)
            }
            None => {
                debug!("selected contour {} has zero area", idx);
                FrameOutcome::NoDetection(NoDetectionReason::DegenerateArea)
            }
        };

        FrameAnalysis {
            mask,
            filtered,
            contour_count,
            selected: Some(selected),
            outcome,
        }
    }

    /// Locate the target in an already-segmented mask
    pub fn locate_in_mask(&self, mask: &BinaryMask, config: &TrackerConfig) -> FrameOutcome {
        self.process_mask(mask.clone(), config).outcome
    }
}
