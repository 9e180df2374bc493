use crate::config::DistanceModel;
use crate::models::RectSize;

/// Pinhole estimate `d = f * W / r` for a target spanning `span_px` pixels.
///
/// Returns `None` when the span is zero or not a usable number.
pub fn distance_from_span(model: &DistanceModel, span_px: f64) -> Option<f64> {
    if !(span_px.is_finite() && span_px > 0.0) {
        return None;
    }
    let d = model.focal_length_px * model.target_width / span_px;
    d.is_finite().then_some(d)
}

/// Estimate distance from the longer side of the bounding rectangle
pub fn estimate_distance(model: &DistanceModel, rect: &RectSize) -> Option<f64> {
    distance_from_span(model, rect.longer_side())
}
