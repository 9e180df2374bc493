use image::{GrayImage, RgbImage};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

/// A captured color frame (8-bit RGB)
pub type Frame = RgbImage;

/// Binary mask: 255 = in target color range, 0 = otherwise
pub type BinaryMask = GrayImage;

/// A color in the 8-bit HSV space (hue stored as degrees / 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Inclusive lower/upper HSV band used for segmentation.
///
/// Inverted bounds are allowed; they simply match fewer (or no) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, color: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&color.h)
            && (self.lower.s..=self.upper.s).contains(&color.s)
            && (self.lower.v..=self.upper.v).contains(&color.v)
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        Self {
            lower: Hsv::new(40, 58, 94),
            upper: Hsv::new(255, 255, 255),
        }
    }
}

/// Boundary of one connected foreground region
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
    /// True when this boundary encloses a hole inside a region
    pub is_hole: bool,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points, is_hole: false }
    }

    pub fn from_coords(coords: &[(i32, i32)]) -> Self {
        Self::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn moments(&self) -> Moments {
        Moments::of_polygon(&self.points)
    }

    /// Enclosed area of the boundary polygon
    pub fn area(&self) -> f64 {
        self.moments().m00
    }
}

/// Spatial moments of a closed polygon up to first order.
///
/// Computed with Green's theorem over the boundary, so `m00` is the enclosed
/// area rather than a pixel count. Sign is normalized so `m00 >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    pub fn of_polygon(points: &[Point<i32>]) -> Self {
        if points.len() < 3 {
            return Self::default();
        }

        let mut a2: i64 = 0;
        let mut x6: i64 = 0;
        let mut y6: i64 = 0;

        for (i, p) in points.iter().enumerate() {
            let q = points[(i + 1) % points.len()];
            let (x0, y0) = (p.x as i64, p.y as i64);
            let (x1, y1) = (q.x as i64, q.y as i64);
            let cross = x0 * y1 - x1 * y0;
            a2 += cross;
            x6 += (x0 + x1) * cross;
            y6 += (y0 + y1) * cross;
        }

        let sign = if a2 < 0 { -1.0 } else { 1.0 };
        Self {
            m00: sign * a2 as f64 / 2.0,
            m10: sign * x6 as f64 / 6.0,
            m01: sign * y6 as f64 / 6.0,
        }
    }

    /// Centroid `(m10 / m00, m01 / m00)`, or `None` for a zero-area shape
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00 == 0.0 || !self.m00.is_finite() {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }
}

/// Side lengths of a rotated bounding rectangle, in pixels (unordered)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectSize {
    pub width: f64,
    pub height: f64,
}

impl RectSize {
    pub fn longer_side(&self) -> f64 {
        self.width.max(self.height)
    }
}

/// Per-frame detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEstimate {
    pub centroid: (f64, f64),
    pub frame_center: (f64, f64),
    /// `cx - width / 2`; positive means the target is right of center
    pub offset_x: f64,
    /// `cy - height / 2`; positive means the target is below center
    pub offset_y: f64,
    pub area: f64,
    pub rect: Option<RectSize>,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoDetectionReason {
    /// Nothing survived segmentation and filtering
    NoContours,
    /// The largest contour encloses zero area
    DegenerateArea,
}

/// Outcome of processing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameOutcome {
    Detected(TargetEstimate),
    NoDetection(NoDetectionReason),
}

impl FrameOutcome {
    pub fn estimate(&self) -> Option<&TargetEstimate> {
        match self {
            FrameOutcome::Detected(estimate) => Some(estimate),
            FrameOutcome::NoDetection(_) => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, FrameOutcome::Detected(_))
    }
}
