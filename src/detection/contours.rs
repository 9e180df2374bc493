use image::imageops::replace;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

use crate::models::{BinaryMask, Contour};

/// Find the boundaries of every connected foreground region.
///
/// Outer borders and hole borders are both returned, in raster-scan order,
/// with no hierarchy filtering. Each boundary is reduced to its corner points.
///
/// Pixels outside the mask count as background, so regions touching the
/// frame edge still get a closed outer border.
pub fn extract_contours(mask: &BinaryMask) -> Vec<Contour> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut padded = GrayImage::new(width + 2, height + 2);
    replace(&mut padded, mask, 1, 1);

    let (max_x, max_y) = (width as i32 - 1, height as i32 - 1);
    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| !c.points.is_empty())
        .map(|c| {
            let points: Vec<Point<i32>> = c
                .points
                .iter()
                .map(|p| Point::new((p.x - 1).clamp(0, max_x), (p.y - 1).clamp(0, max_y)))
                .collect();
            Contour {
                points: compress_collinear(&points),
                is_hole: matches!(c.border_type, BorderType::Hole),
            }
        })
        .collect()
}

fn step(from: Point<i32>, to: Point<i32>) -> (i32, i32) {
    ((to.x - from.x).signum(), (to.y - from.y).signum())
}

/// Drop points that sit in the middle of a straight horizontal, vertical or
/// diagonal run of a closed boundary.
pub fn compress_collinear(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut points = points.to_vec();
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    let n = points.len();
    if n < 3 {
        return points;
    }

    let kept: Vec<Point<i32>> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            step(prev, cur) != step(cur, next)
        })
        .map(|i| points[i])
        .collect();

    if kept.is_empty() { points } else { kept }
}
