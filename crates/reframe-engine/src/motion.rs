//! Inter-frame motion scoring.

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::source::Frame;

/// Motion between two frames on a 0..=`cap` scale.
///
/// Mean absolute difference of the grayscale frames, multiplied by `scale`
/// and capped. `curr` is resized to `prev`'s size when they differ.
pub fn motion_score(prev: &Frame, curr: &Frame, scale: f64, cap: f64) -> f64 {
    let prev_gray = imageops::grayscale(prev);
    let mut curr_gray = imageops::grayscale(curr);

    if curr_gray.dimensions() != prev_gray.dimensions() {
        let (w, h) = prev_gray.dimensions();
        curr_gray = imageops::resize(&curr_gray, w, h, FilterType::Triangle);
    }

    (mean_abs_diff(&prev_gray, &curr_gray) * scale).clamp(0.0, cap)
}

fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> f64 {
    let count = a.as_raw().len();
    if count == 0 {
        return 0.0;
    }

    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();

    total as f64 / count as f64
}
