use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use imageproc::point::Point;
use log::debug;

use crate::detection::locate::min_area_rect;
use crate::detection::FrameAnalysis;
use crate::models::{Frame, FrameOutcome};

const CONTOUR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const RECT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const CENTER_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const CENTROID_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OFFSET_LINE_COLOR: Rgb<u8> = Rgb([0, 255, 255]);

/// Debug consumer of per-frame results
pub trait DisplaySink: Send {
    fn show(&mut self, frame_index: u64, frame: &Frame, analysis: &FrameAnalysis) -> Result<()>;
}

fn draw_closed_polyline(canvas: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
    if points.len() == 1 {
        draw_filled_circle_mut(canvas, (points[0].x, points[0].y), 1, color);
        return;
    }
    for i in 0..points.len() {
        let p1 = points[i];
        let p2 = points[(i + 1) % points.len()];
        draw_line_segment_mut(
            canvas,
            (p1.x as f32, p1.y as f32),
            (p2.x as f32, p2.y as f32),
            color,
        );
    }
}

/// Draw the selected contour, its rectangle, the frame center and the centroid
pub fn annotate(frame: &Frame, analysis: &FrameAnalysis) -> RgbImage {
    let mut canvas = frame.clone();

    if let Some(contour) = &analysis.selected {
        draw_closed_polyline(&mut canvas, &contour.points, CONTOUR_COLOR);
        if let Some(rect) = min_area_rect(contour) {
            let corners = rect
                .corners()
                .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32));
            draw_closed_polyline(&mut canvas, &corners, RECT_COLOR);
        }
    }

    let center = (frame.width() as f32 / 2.0, frame.height() as f32 / 2.0);
    if let FrameOutcome::Detected(estimate) = &analysis.outcome {
        let centroid = (estimate.centroid.0 as f32, estimate.centroid.1 as f32);
        draw_line_segment_mut(&mut canvas, center, centroid, OFFSET_LINE_COLOR);
        draw_filled_circle_mut(
            &mut canvas,
            (centroid.0.round() as i32, centroid.1.round() as i32),
            2,
            CENTROID_COLOR,
        );
    }
    draw_filled_circle_mut(
        &mut canvas,
        (center.0 as i32, center.1 as i32),
        2,
        CENTER_COLOR,
    );

    canvas
}

/// Saves input, masks and annotated frame as PNGs for offline inspection.
///
/// Each saved frame gets its own `frame_NNNNNN/` directory with numbered
/// stage images, so a run can be replayed step by step.
pub struct DebugImageSink {
    output_dir: PathBuf,
    every: u64,
}

impl DebugImageSink {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self {
            output_dir,
            every: 1,
        })
    }

    /// Only save every `n`th frame
    pub fn with_interval(mut self, n: u64) -> Self {
        self.every = n.max(1);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn frame_dir(&self, frame_index: u64) -> PathBuf {
        self.output_dir.join(format!("frame_{:06}", frame_index))
    }
}

impl DisplaySink for DebugImageSink {
    fn show(&mut self, frame_index: u64, frame: &Frame, analysis: &FrameAnalysis) -> Result<()> {
        if frame_index % self.every != 0 {
            return Ok(());
        }

        let dir = self.frame_dir(frame_index);
        std::fs::create_dir_all(&dir)?;

        let save = |name: &str, result: image::ImageResult<()>| {
            result.map_err(|e| anyhow::anyhow!("Failed to save debug image {}: {}", name, e))
        };
        save("00_input.png", frame.save(dir.join("00_input.png")))?;
        save("01_mask.png", analysis.mask.save(dir.join("01_mask.png")))?;
        save("02_filtered.png", analysis.filtered.save(dir.join("02_filtered.png")))?;
        save(
            "03_annotated.png",
            annotate(frame, analysis).save(dir.join("03_annotated.png")),
        )?;

        debug!("Debug: saved frame {} to {}", frame_index, dir.display());
        Ok(())
    }
}
