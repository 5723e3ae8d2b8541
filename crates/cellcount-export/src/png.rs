//! PNG encoding of overlay and debug images.
//!
//! Uses [`image::codecs::png::PngEncoder`] on an in-memory buffer.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, RgbImage};

use crate::ExportError;

/// Encode a grayscale image (direct overlay, masks, debug planes) as PNG.
///
/// # Errors
///
/// Returns [`ExportError::EmptyImage`] for a zero-sized image and
/// [`ExportError::Png`] if encoding fails.
pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, ExportError> {
    encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::L8)
}

/// Encode an RGB image (numbered watershed overlay) as PNG.
///
/// # Errors
///
/// See [`encode_gray_png`].
pub fn encode_rgb_png(image: &RgbImage) -> Result<Vec<u8>, ExportError> {
    encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
}

fn encode(raw: &[u8], width: u32, height: u32, color: ExtendedColorType) -> Result<Vec<u8>, ExportError> {
    if width == 0 || height == 0 {
        return Err(ExportError::EmptyImage { width, height });
    }
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(raw, width, height, color)?;
    Ok(bytes)
}
