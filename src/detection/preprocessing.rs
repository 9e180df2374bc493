use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::close;

use crate::config::FilterConfig;
use crate::models::BinaryMask;

/// Close small holes with a cross-shaped element of the given L1 radius
pub fn close_gaps(mask: &BinaryMask, radius: u8) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    close(mask, Norm::L1, radius)
}

/// Remove isolated speckle with a median filter
pub fn remove_speckle(mask: &BinaryMask, radius: u32) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    median_filter(mask, radius, radius)
}

/// Blur the mask and threshold it back to binary at the midpoint
pub fn smooth_edges(mask: &BinaryMask, sigma: f32) -> BinaryMask {
    let mut blurred = gaussian_blur_f32(mask, sigma);
    for pixel in blurred.pixels_mut() {
        pixel[0] = if pixel[0] >= 128 { 255 } else { 0 };
    }
    blurred
}

/// Full noise suppression pass: close, median, then optional blur
pub fn filter_mask(mask: &BinaryMask, config: &FilterConfig) -> BinaryMask {
    let closed = close_gaps(mask, config.close_radius);
    let despeckled = remove_speckle(&closed, config.median_radius);

    match config.blur_sigma {
        Some(sigma) if sigma > 0.0 => smooth_edges(&despeckled, sigma),
        _ => despeckled,
    }
}
