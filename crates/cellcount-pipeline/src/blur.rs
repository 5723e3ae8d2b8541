//! Gaussian smoothing with an explicit kernel size.
//!
//! Both the intensity blur and the distance-field smoothing are specified
//! by kernel size rather than sigma. [`gaussian_kernel`] builds the 1D
//! kernel (fixed binomial taps for sizes 1, 3, 5 and 7, sampled Gaussian
//! with `sigma = 0.3 * ((k - 1) * 0.5 - 1) + 0.8` otherwise).
//!
//! Filtering is [`imageproc::filter::separable_filter_equal`] on `f32`
//! planes, which replicates edge pixels at the border. [`gaussian_blur`]
//! rounds back to 8 bits rather than truncating.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;

/// Bump an even kernel size to the next odd value.
#[must_use]
pub const fn odd_kernel_size(size: u32) -> u32 {
    if size % 2 == 0 { size + 1 } else { size }
}

/// Normalized 1D Gaussian kernel of length `size` (forced odd).
#[must_use]
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = odd_kernel_size(size.max(1));
    let taps: Vec<f32> = match size {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![1.0, 4.0, 6.0, 4.0, 1.0],
        7 => vec![1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0],
        _ => {
            let sigma = 0.3f64.mul_add((f64::from(size) - 1.0).mul_add(0.5, -1.0), 0.8);
            let half = f64::from(size / 2);
            (0..size)
                .map(|i| {
                    let d = f64::from(i) - half;
                    #[allow(clippy::cast_possible_truncation)]
                    let w = (-(d * d) / (2.0 * sigma * sigma)).exp() as f32;
                    w
                })
                .collect()
        }
    };
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Apply a Gaussian blur of the given kernel size to a grayscale image.
///
/// A kernel size of 1 returns the image unchanged.
#[must_use = "returns the blurred image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gaussian_blur(image: &GrayImage, kernel_size: u32) -> GrayImage {
    if odd_kernel_size(kernel_size.max(1)) == 1 {
        return image.clone();
    }
    let plane: Image<Luma<f32>> = Image::from_fn(image.width(), image.height(), |x, y| {
        Luma([f32::from(image.get_pixel(x, y).0[0])])
    });
    let blurred = smooth(&plane, kernel_size);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([blurred.get_pixel(x, y).0[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// Apply a Gaussian blur of the given kernel size to an `f32` plane.
#[must_use = "returns the smoothed plane"]
pub fn smooth(plane: &Image<Luma<f32>>, kernel_size: u32) -> Image<Luma<f32>> {
    let kernel = gaussian_kernel(kernel_size);
    if kernel.len() == 1 || plane.width() == 0 || plane.height() == 0 {
        return plane.clone();
    }
    imageproc::filter::separable_filter_equal(plane, &kernel)
}
