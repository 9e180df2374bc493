use imageproc::geometry::convex_hull;

use crate::models::{Contour, RectSize, TargetEstimate};

/// Rotated rectangle: center, side lengths, and the direction of the
/// `width` side as a unit vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: (f64, f64),
    pub size: RectSize,
    pub axis: (f64, f64),
}

impl RotatedRect {
    /// Corners in drawing order
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (ux, uy) = self.axis;
        let (vx, vy) = (-uy, ux);
        let (hw, hh) = (self.size.width / 2.0, self.size.height / 2.0);
        let (cx, cy) = self.center;
        let corner = |a: f64, b: f64| (cx + a * ux + b * vx, cy + a * uy + b * vy);
        [
            corner(-hw, -hh),
            corner(hw, -hh),
            corner(hw, hh),
            corner(-hw, hh),
        ]
    }
}

/// Minimum-area rectangle (any rotation) enclosing a contour.
///
/// One side of the optimal rectangle is collinear with a hull edge, so every
/// hull edge is tried as the rectangle axis.
pub fn min_area_rect(contour: &Contour) -> Option<RotatedRect> {
    if contour.is_empty() {
        return None;
    }

    let hull: Vec<(f64, f64)> = convex_hull(contour.points.as_slice())
        .iter()
        .map(|p| (p.x as f64, p.y as f64))
        .collect();
    let first = *hull.first()?;

    let mut best: Option<(f64, RotatedRect)> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let len = (b.0 - a.0).hypot(b.1 - a.1);
        if len == 0.0 {
            continue;
        }
        let u = ((b.0 - a.0) / len, (b.1 - a.1) / len);
        let v = (-u.1, u.0);

        let (mut s_min, mut s_max) = (f64::MAX, f64::MIN);
        let (mut t_min, mut t_max) = (f64::MAX, f64::MIN);
        for p in &hull {
            let s = p.0 * u.0 + p.1 * u.1;
            let t = p.0 * v.0 + p.1 * v.1;
            s_min = s_min.min(s);
            s_max = s_max.max(s);
            t_min = t_min.min(t);
            t_max = t_max.max(t);
        }

        let size = RectSize {
            width: s_max - s_min,
            height: t_max - t_min,
        };
        let area = size.width * size.height;
        if best.as_ref().is_some_and(|(best_area, _)| area >= *best_area) {
            continue;
        }

        let (s_mid, t_mid) = ((s_min + s_max) / 2.0, (t_min + t_max) / 2.0);
        let center = (s_mid * u.0 + t_mid * v.0, s_mid * u.1 + t_mid * v.1);
        best = Some((area, RotatedRect { center, size, axis: u }));
    }

    Some(best.map(|(_, rect)| rect).unwrap_or(RotatedRect {
        center: first,
        size: RectSize { width: 0.0, height: 0.0 },
        axis: (1.0, 0.0),
    }))
}

/// Side lengths of the minimum-area rectangle around a contour
pub fn bounding_rect(contour: &Contour) -> Option<RectSize> {
    min_area_rect(contour).map(|rect| rect.size)
}

/// Frame center as `(width / 2, height / 2)`
pub fn frame_center(frame_width: u32, frame_height: u32) -> (f64, f64) {
    (frame_width as f64 / 2.0, frame_height as f64 / 2.0)
}

/// Signed horizontal error; positive means right of center
pub fn horizontal_offset(cx: f64, frame_width: u32) -> f64 {
    cx - frame_width as f64 / 2.0
}

/// Signed vertical error; positive means below center
pub fn vertical_offset(cy: f64, frame_height: u32) -> f64 {
    cy - frame_height as f64 / 2.0
}

/// Locate a selected contour relative to the frame.
///
/// Returns `None` for a zero-area contour. Distance is left unset; the
/// caller fills it in from the rectangle.
pub fn locate(contour: &Contour, frame_width: u32, frame_height: u32) -> Option<TargetEstimate> {
    let moments = contour.moments();
    let (cx, cy) = moments.centroid()?;

    Some(TargetEstimate {
        centroid: (cx, cy),
        frame_center: frame_center(frame_width, frame_height),
        offset_x: horizontal_offset(cx, frame_width),
        offset_y: vertical_offset(cy, frame_height),
        area: moments.m00,
        rect: bounding_rect(contour),
        distance: None,
    })
}
