use image::{Luma, Rgb};
use imageproc::map::map_pixels;

use crate::models::{BinaryMask, ColorRange, Frame, Hsv};

pub const FOREGROUND: Luma<u8> = Luma([255]);
pub const BACKGROUND: Luma<u8> = Luma([0]);

/// Convert an RGB pixel to 8-bit HSV (hue halved to fit in a byte)
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> Hsv {
    let [r, g, b] = pixel.0;
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;
    let v = max as f32;

    let s = if max == 0 { 0.0 } else { 255.0 * delta / v };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (gf - bf) / delta
    } else if max == g {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    Hsv {
        // 359.x degrees rounds to 180, which wraps back to red
        h: ((h / 2.0).round() as u16 % 180) as u8,
        s: s.round() as u8,
        v: max,
    }
}

/// Mark every pixel whose HSV value lies inside `range`
pub fn segment(frame: &Frame, range: &ColorRange) -> BinaryMask {
    map_pixels(frame, |_, _, pixel| {
        if range.contains(rgb_to_hsv(pixel)) {
            FOREGROUND
        } else {
            BACKGROUND
        }
    })
}

/// Number of foreground pixels in a mask
pub fn foreground_count(mask: &BinaryMask) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}
