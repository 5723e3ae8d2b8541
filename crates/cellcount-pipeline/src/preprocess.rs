//! Channel extraction, intensity normalization and smoothing.
//!
//! The first stage of both segmentation paths:
//!
//! ```text
//! DynamicImage -> single plane (f32, nominal 0..=255) -> [min/max stretch] -> u8 -> blur
//! ```
//!
//! Single-channel (8/16-bit, float) and three-channel RGB images are
//! accepted; anything else is [`SegmentError::InvalidShape`]. Samples are
//! first mapped onto a nominal 0..=255 scale (16-bit divided by 257, float
//! multiplied by 255) so the unnormalized direct path thresholds 16-bit
//! input the same way it thresholds 8-bit input.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::blur;
use crate::types::SegmentError;

/// How a three-channel image is reduced to the analyzed plane.
///
/// Ignored for single-channel images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelect {
    /// Weighted luminance `0.299 R + 0.587 G + 0.114 B`.
    #[default]
    Luminance,
    /// A single channel by index (0 = R, 1 = G, 2 = B).
    Index(u8),
}

/// Output of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Selected plane converted to 8 bits (stretched when requested).
    pub normalized: GrayImage,
    /// `normalized` after Gaussian smoothing.
    pub blurred: GrayImage,
}

/// Extract the analyzed plane, optionally stretch it, and blur it.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidShape`] for layouts other than one or
/// three channels. Returns [`SegmentError::InvalidParameter`] for a
/// channel index above 2 or a zero kernel size.
pub fn preprocess(
    image: &DynamicImage,
    channel: ChannelSelect,
    normalize: bool,
    blur_kernel: u32,
) -> Result<Preprocessed, SegmentError> {
    if blur_kernel == 0 {
        return Err(SegmentError::InvalidParameter(
            "blur_kernel must be positive".to_string(),
        ));
    }
    let plane = extract_plane(image, channel)?;
    let normalized = if normalize {
        normalize_min_max(&plane, image.width(), image.height())
    } else {
        quantize(&plane, image.width(), image.height())
    };
    let blurred = blur::gaussian_blur(&normalized, blur_kernel);
    Ok(Preprocessed {
        normalized,
        blurred,
    })
}

/// Reduce `image` to one plane of `f32` samples on a nominal 0..=255 scale.
///
/// # Errors
///
/// See [`preprocess`].
pub fn extract_plane(image: &DynamicImage, channel: ChannelSelect) -> Result<Vec<f32>, SegmentError> {
    if let ChannelSelect::Index(c) = channel
        && c > 2
    {
        return Err(SegmentError::InvalidParameter(format!(
            "channel must be 0, 1 or 2, got {c}"
        )));
    }

    let plane = match image {
        DynamicImage::ImageLuma8(img) => img.pixels().map(|p| f32::from(p.0[0])).collect(),
        DynamicImage::ImageLuma16(img) => img.pixels().map(|p| f32::from(p.0[0]) / 257.0).collect(),
        DynamicImage::ImageRgb8(img) => img
            .pixels()
            .map(|p| select(p.0.map(f32::from), channel))
            .collect(),
        DynamicImage::ImageRgb16(img) => img
            .pixels()
            .map(|p| select(p.0.map(|v| f32::from(v) / 257.0), channel))
            .collect(),
        DynamicImage::ImageRgb32F(img) => img
            .pixels()
            .map(|p| select(p.0.map(|v| v * 255.0), channel))
            .collect(),
        other => {
            return Err(SegmentError::InvalidShape(format!(
                "{:?} with {} channels (expected 1 or 3)",
                other.color(),
                other.color().channel_count(),
            )));
        }
    };
    Ok(plane)
}

fn select(rgb: [f32; 3], channel: ChannelSelect) -> f32 {
    match channel {
        ChannelSelect::Luminance => {
            0.114f32.mul_add(rgb[2], 0.299f32.mul_add(rgb[0], 0.587 * rgb[1]))
        }
        ChannelSelect::Index(c) => rgb[usize::from(c.min(2))],
    }
}

/// Stretch a plane linearly so its minimum maps to 0 and maximum to 255.
///
/// A constant plane maps to all zeros.
#[must_use]
pub fn normalize_min_max(plane: &[f32], width: u32, height: u32) -> GrayImage {
    let (min, max) = plane
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    let scale = if range > f32::EPSILON { 255.0 / range } else { 0.0 };
    let stretched: Vec<f32> = plane.iter().map(|&v| (v - min) * scale).collect();
    quantize(&stretched, width, height)
}

/// Round and clamp a nominal 0..=255 plane into an 8-bit image.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(plane: &[f32], width: u32, height: u32) -> GrayImage {
    let raw: Vec<u8> = plane
        .iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    GrayImage::from_raw(width, height, raw).unwrap_or_else(|| GrayImage::new(width, height))
}
