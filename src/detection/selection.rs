use crate::models::Contour;

/// Pick the contour with the largest enclosed area.
///
/// Ties keep the earliest contour. Returns `None` when there is nothing to
/// choose from.
pub fn select_largest(contours: &[Contour]) -> Option<(usize, &Contour)> {
    let mut best: Option<(usize, &Contour, f64)> = None;

    for (idx, contour) in contours.iter().enumerate() {
        let area = contour.area();
        match best {
            Some((_, _, best_area)) if area <= best_area => {}
            _ => best = Some((idx, contour, area)),
        }
    }

    best.map(|(idx, contour, _)| (idx, contour))
}
