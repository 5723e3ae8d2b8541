//! Region of interest: restrict analysis to the area between two curves.
//!
//! A user traces a start curve and a stop curve across the image (for
//! example the two edges of a tissue band). The polygon is the start curve
//! followed by the stop curve reversed, so the two curves close into a
//! ring. Pixels outside the filled polygon are zeroed before segmentation.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Primitive};
use imageproc::drawing::draw_polygon_mut;

use crate::threshold::FOREGROUND;
use crate::types::{Dimensions, Point, SegmentError};

/// Close two curves into one polygon: `start` then `stop` reversed.
#[must_use]
pub fn polygon_from_curves(start: &[Point], stop: &[Point]) -> Vec<Point> {
    start.iter().chain(stop.iter().rev()).copied().collect()
}

/// Fill `polygon` into a mask of the given size (255 inside and on the
/// outline, 0 elsewhere).
///
/// Vertices are rounded to the nearest pixel. Repeated consecutive
/// vertices and a closing vertex equal to the first are dropped.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidParameter`] if fewer than three distinct
/// vertices remain.
pub fn polygon_mask(dimensions: Dimensions, polygon: &[Point]) -> Result<GrayImage, SegmentError> {
    let mut vertices: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(polygon.len());
    for p in polygon {
        let v = round_point(*p);
        if vertices.last() != Some(&v) {
            vertices.push(v);
        }
    }
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() < 3 {
        return Err(SegmentError::InvalidParameter(format!(
            "region of interest needs at least 3 distinct vertices, got {}",
            vertices.len()
        )));
    }

    let mut mask = GrayImage::new(dimensions.width, dimensions.height);
    draw_polygon_mut(&mut mask, &vertices, Luma([FOREGROUND]));
    Ok(mask)
}

#[allow(clippy::cast_possible_truncation)]
fn round_point(p: Point) -> imageproc::point::Point<i32> {
    imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32)
}

/// Zero every pixel of `image` where `mask` is 0, keeping the layout.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidShape`] if the mask size differs from
/// the image size or the layout is not one the pipeline accepts.
pub fn apply_mask(image: &DynamicImage, mask: &GrayImage) -> Result<DynamicImage, SegmentError> {
    if image.width() != mask.width() || image.height() != mask.height() {
        return Err(SegmentError::InvalidShape(format!(
            "mask is {}x{} but image is {}x{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )));
    }
    let masked = match image {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(zero_outside(buf, mask)),
        DynamicImage::ImageLuma16(buf) => DynamicImage::ImageLuma16(zero_outside(buf, mask)),
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(zero_outside(buf, mask)),
        DynamicImage::ImageRgb16(buf) => DynamicImage::ImageRgb16(zero_outside(buf, mask)),
        DynamicImage::ImageRgb32F(buf) => DynamicImage::ImageRgb32F(zero_outside(buf, mask)),
        other => {
            return Err(SegmentError::InvalidShape(format!(
                "{:?} cannot be masked",
                other.color()
            )));
        }
    };
    Ok(masked)
}

fn zero_outside<P: Pixel>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    mask: &GrayImage,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if mask.get_pixel(x, y).0[0] == 0 {
            pixel.apply(|_| <P::Subpixel as Primitive>::DEFAULT_MIN_VALUE);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DIMS: Dimensions = Dimensions {
        width: 20,
        height: 20,
    };

    #[test]
    fn stop_curve_is_reversed() {
        let start = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let stop = [Point::new(0.0, 5.0), Point::new(10.0, 5.0)];
        let polygon = polygon_from_curves(&start, &stop);
        assert_eq!(
            polygon,
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 5.0),
                Point::new(0.0, 5.0),
            ]
        );
    }

    #[test]
    fn band_between_curves_is_filled() {
        let start = [Point::new(2.0, 4.0), Point::new(17.0, 4.0)];
        let stop = [Point::new(2.0, 12.0), Point::new(17.0, 12.0)];
        let mask = polygon_mask(DIMS, &polygon_from_curves(&start, &stop)).unwrap();
        assert_eq!(mask.get_pixel(10, 8).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(10, 4).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(10, 1).0[0], 0);
        assert_eq!(mask.get_pixel(10, 16).0[0], 0);
        assert_eq!(mask.get_pixel(0, 8).0[0], 0);
    }

    #[test]
    fn closing_vertex_is_tolerated() {
        let polygon = [
            Point::new(1.0, 1.0),
            Point::new(8.0, 1.0),
            Point::new(8.0, 8.0),
            Point::new(1.0, 1.0),
        ];
        assert!(polygon_mask(DIMS, &polygon).is_ok());
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        let polygon = [Point::new(1.0, 1.0), Point::new(1.2, 0.9), Point::new(5.0, 5.0)];
        assert!(matches!(
            polygon_mask(DIMS, &polygon),
            Err(SegmentError::InvalidParameter(_))
        ));
        assert!(polygon_mask(DIMS, &[]).is_err());
    }

    #[test]
    fn apply_mask_zeroes_outside_and_keeps_layout() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 4, image::Rgb([9, 8, 7])));
        let mask = GrayImage::from_fn(4, 4, |x, _| if x < 2 { Luma([255]) } else { Luma([0]) });
        let masked = apply_mask(&image, &mask).unwrap();
        let DynamicImage::ImageRgb8(rgb) = masked else {
            unreachable!("layout changed");
        };
        assert_eq!(rgb.get_pixel(1, 3).0, [9, 8, 7]);
        assert_eq!(rgb.get_pixel(2, 0).0, [0, 0, 0]);
    }

    #[test]
    fn apply_mask_rejects_size_mismatch() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let mask = GrayImage::new(3, 4);
        assert!(matches!(
            apply_mask(&image, &mask),
            Err(SegmentError::InvalidShape(_))
        ));
    }
}
