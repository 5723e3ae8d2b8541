//! Image decoding for callers that start from file bytes.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, TIFF) and produces a
//! [`DynamicImage`] whose layout the preprocessor accepts. Bit depth is
//! preserved so 16-bit microscopy TIFFs keep their dynamic range until
//! normalization.

use image::DynamicImage;

use crate::types::SegmentError;

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`SegmentError::EmptyInput`] if `bytes` is empty.
/// Returns [`SegmentError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, SegmentError> {
    if bytes.is_empty() {
        return Err(SegmentError::EmptyInput);
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Drop an alpha channel while keeping the sample depth.
///
/// PNG exports frequently carry an opaque alpha channel, which would
/// otherwise be rejected as a four-channel layout. Images without alpha
/// are returned unchanged.
#[must_use = "returns the image without alpha"]
pub fn strip_alpha(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLumaA8(_) => DynamicImage::ImageLuma8(image.to_luma8()),
        DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma16(image.to_luma16()),
        DynamicImage::ImageRgba8(_) => DynamicImage::ImageRgb8(image.to_rgb8()),
        DynamicImage::ImageRgba16(_) => DynamicImage::ImageRgb16(image.to_rgb16()),
        DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgb32F(image.to_rgb32f()),
        other => other,
    }
}
