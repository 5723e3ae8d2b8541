//! Binarization: turn a smoothed grayscale image into a foreground mask.
//!
//! The [`Binarizer`] trait and [`ThresholdMethod`] enum mirror the other
//! pluggable stages: the direct path uses a fixed cut-off, the watershed
//! path picks one with Otsu's method.
//!
//! Foreground pixels are those strictly above the threshold and are set
//! to 255; everything else is 0. A uniform image has no foreground.

use image::{GrayImage, Luma};

/// Foreground value in binary masks.
pub const FOREGROUND: u8 = 255;

/// Selects how the threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdMethod {
    /// Use this exact value.
    Fixed(u8),
    /// Maximize between-class variance over the image histogram.
    #[default]
    Otsu,
}

/// A binary mask together with the threshold that produced it.
#[derive(Debug, Clone)]
pub struct Binarized {
    /// 255 for foreground, 0 for background.
    pub mask: GrayImage,
    /// Threshold actually applied.
    pub threshold: u8,
}

impl Binarized {
    /// Number of foreground pixels.
    #[must_use]
    pub fn foreground_count(&self) -> u64 {
        self.mask.pixels().filter(|p| p.0[0] == FOREGROUND).count() as u64
    }
}

/// Trait for binarization strategies.
pub trait Binarizer {
    /// Produce a foreground mask from a grayscale image.
    fn binarize(&self, image: &GrayImage) -> Binarized;
}

impl Binarizer for ThresholdMethod {
    fn binarize(&self, image: &GrayImage) -> Binarized {
        let threshold = match *self {
            Self::Fixed(t) => t,
            Self::Otsu => otsu_threshold(image),
        };
        Binarized {
            mask: apply_threshold(image, threshold),
            threshold,
        }
    }
}

/// Otsu's threshold for `image`.
///
/// For an empty or uniform image the single intensity present is returned,
/// so [`apply_threshold`] yields an empty mask.
#[must_use]
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut pixels = image.pixels().map(|p| p.0[0]);
    let Some(first) = pixels.next() else {
        return 0;
    };
    let (min, max) = pixels.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min == max {
        return min;
    }
    imageproc::contrast::otsu_level(image)
}

/// Mark pixels strictly above `threshold` as foreground.
#[must_use = "returns the binary mask"]
pub fn apply_threshold(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] > threshold {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}
