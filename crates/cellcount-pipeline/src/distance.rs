//! Euclidean distance from each foreground pixel to the nearest background.
//!
//! Built on [`imageproc::distance_transform::euclidean_squared_distance_transform`],
//! which measures distance to the nearest *nonzero* pixel, so the mask is
//! inverted first. The result is exact Euclidean distance; background
//! pixels are 0.
//!
//! A mask with no background pixels has no finite distances. Those are
//! capped at the image diagonal so the peak stays usable for seeding.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;

use crate::blur;

/// Single-channel `f32` raster holding distances.
pub type DistanceImage = Image<Luma<f32>>;

/// Kernel size used to smooth the distance field before the local-maximum
/// test.
pub const SMOOTHING_KERNEL: u32 = 3;

/// Distance field of a binary mask.
#[derive(Debug, Clone)]
pub struct DistanceField {
    /// Exact distance per pixel.
    pub raw: DistanceImage,
    /// `raw` after a small Gaussian blur.
    pub smoothed: DistanceImage,
}

impl DistanceField {
    /// Largest raw distance (0 for an empty mask).
    #[must_use]
    pub fn max(&self) -> f32 {
        max_value(&self.raw)
    }
}

/// Largest value in `image`, never below 0.
#[must_use]
pub fn max_value(image: &DistanceImage) -> f32 {
    image.iter().copied().fold(0.0, f32::max)
}

/// Compute the distance field of `mask` (nonzero = foreground).
#[must_use = "returns the distance field"]
pub fn distance_field(mask: &GrayImage) -> DistanceField {
    let raw = euclidean_distance(mask);
    let smoothed = blur::smooth(&raw, SMOOTHING_KERNEL);
    DistanceField { raw, smoothed }
}

/// Exact Euclidean distance to the nearest zero pixel of `mask`.
#[must_use = "returns the distance image"]
#[allow(clippy::cast_possible_truncation)]
pub fn euclidean_distance(mask: &GrayImage) -> DistanceImage {
    let (width, height) = mask.dimensions();
    let inverted = GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y).0[0] == 0 {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let squared = imageproc::distance_transform::euclidean_squared_distance_transform(&inverted);
    let cap = f64::from(width).hypot(f64::from(height));

    DistanceImage::from_fn(width, height, |x, y| {
        let d = squared.get_pixel(x, y).0[0].sqrt();
        Luma([if d.is_finite() { d.min(cap) as f32 } else { cap as f32 }])
    })
}
