//! Shared types for the cellcount segmentation pipeline.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceImage;
use crate::label::LabelGrid;
use crate::preprocess::ChannelSelect;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` for the numbered watershed overlay.
pub use image::RgbImage;

/// Re-export `DynamicImage`, the pipeline's input image type.
pub use image::DynamicImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Axis-aligned bounding box of a region, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Leftmost column.
    pub x: u32,
    /// Topmost row.
    pub y: u32,
    /// Number of rows spanned.
    pub height: u32,
    /// Number of columns spanned.
    pub width: u32,
}

/// One labeled region: the unit of the component list and CSV export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Region id. For the direct path this is the connected-component
    /// label; for the watershed path it is the sequential number drawn on
    /// the overlay (1..=K).
    pub id: u32,
    /// Pixel count.
    pub area: u64,
    /// Bounding box.
    pub bbox: BoundingBox,
    /// Mean pixel coordinate.
    pub centroid: Point,
}

/// Descriptive statistics over the areas of kept regions.
///
/// Every field is zero when no region was kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaStats {
    /// Number of kept regions.
    pub count: usize,
    /// Mean area in pixels.
    pub mean: f64,
    /// Smallest area.
    pub min: u64,
    /// Largest area.
    pub max: u64,
    /// Population standard deviation of the areas.
    pub std_dev: f64,
}

/// Configuration for [`crate::watershed_count`].
///
/// Area bounds are inclusive: a region is kept when
/// `min_area <= area <= max_area`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatershedConfig {
    /// Channel to analyze when the input has three channels.
    pub channel: u8,
    /// Smallest kept region area in pixels.
    pub min_area: u64,
    /// Largest kept region area in pixels.
    pub max_area: u64,
    /// Gaussian kernel size for the intensity blur (even values are
    /// bumped to the next odd value).
    pub blur_kernel: u32,
    /// Window size for the local-maximum test (even values are bumped to
    /// the next odd value).
    pub maxima_kernel: u32,
    /// A local maximum becomes a seed only above this fraction of the
    /// largest distance value. Must be in `(0, 1]`.
    pub peak_thresh_frac: f64,
    /// Dilation iterations used to bound the region the flood may claim.
    pub dilate_iters: u8,
    /// Inject a seed into in-range components that received none.
    pub seed_supplement: bool,
}

impl WatershedConfig {
    /// Default channel (third channel).
    pub const DEFAULT_CHANNEL: u8 = 2;
    /// Default minimum area.
    pub const DEFAULT_MIN_AREA: u64 = 40;
    /// Default maximum area.
    pub const DEFAULT_MAX_AREA: u64 = 20_000;
    /// Default intensity blur kernel size.
    pub const DEFAULT_BLUR_KERNEL: u32 = 3;
    /// Default local-maximum window size.
    pub const DEFAULT_MAXIMA_KERNEL: u32 = 7;
    /// Default peak threshold fraction.
    pub const DEFAULT_PEAK_THRESH_FRAC: f64 = 0.35;
    /// Default background dilation iterations.
    pub const DEFAULT_DILATE_ITERS: u8 = 2;

    /// Check every parameter before any pixel is touched.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidParameter`] naming the first
    /// offending parameter.
    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.channel > 2 {
            return Err(SegmentError::InvalidParameter(format!(
                "channel must be 0, 1 or 2, got {}",
                self.channel
            )));
        }
        validate_kernel("blur_kernel", self.blur_kernel)?;
        validate_kernel("maxima_kernel", self.maxima_kernel)?;
        validate_area_bounds(self.min_area, self.max_area)?;
        if !(self.peak_thresh_frac > 0.0 && self.peak_thresh_frac <= 1.0) {
            return Err(SegmentError::InvalidParameter(format!(
                "peak_thresh_frac must be in (0, 1], got {}",
                self.peak_thresh_frac
            )));
        }
        Ok(())
    }
}

impl Default for WatershedConfig {
    fn default() -> Self {
        Self {
            channel: Self::DEFAULT_CHANNEL,
            min_area: Self::DEFAULT_MIN_AREA,
            max_area: Self::DEFAULT_MAX_AREA,
            blur_kernel: Self::DEFAULT_BLUR_KERNEL,
            maxima_kernel: Self::DEFAULT_MAXIMA_KERNEL,
            peak_thresh_frac: Self::DEFAULT_PEAK_THRESH_FRAC,
            dilate_iters: Self::DEFAULT_DILATE_ITERS,
            seed_supplement: true,
        }
    }
}

/// Configuration for [`crate::direct_segment`].
///
/// Area bounds are inclusive, matching [`WatershedConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    /// How a color input is reduced to one channel.
    pub channel: ChannelSelect,
    /// Stretch intensities to the full 0-255 range before blurring.
    ///
    /// Off by default so `threshold` applies to raw intensities.
    pub normalize: bool,
    /// Gaussian kernel size (even values are bumped to the next odd value).
    pub blur_kernel: u32,
    /// Pixels strictly above this value are foreground.
    pub threshold: u8,
    /// Smallest kept component area in pixels.
    pub min_area: u64,
    /// Largest kept component area in pixels.
    pub max_area: u64,
}

impl DirectConfig {
    /// Default blur kernel size.
    pub const DEFAULT_BLUR_KERNEL: u32 = 3;
    /// Default fixed threshold.
    pub const DEFAULT_THRESHOLD: u8 = 50;
    /// Default minimum area.
    pub const DEFAULT_MIN_AREA: u64 = 200;
    /// Default maximum area.
    pub const DEFAULT_MAX_AREA: u64 = 2000;

    /// Check every parameter before any pixel is touched.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidParameter`] naming the first
    /// offending parameter.
    pub fn validate(&self) -> Result<(), SegmentError> {
        if let ChannelSelect::Index(channel) = self.channel
            && channel > 2
        {
            return Err(SegmentError::InvalidParameter(format!(
                "channel must be 0, 1 or 2, got {channel}"
            )));
        }
        validate_kernel("blur_kernel", self.blur_kernel)?;
        validate_area_bounds(self.min_area, self.max_area)
    }
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            channel: ChannelSelect::default(),
            normalize: false,
            blur_kernel: Self::DEFAULT_BLUR_KERNEL,
            threshold: Self::DEFAULT_THRESHOLD,
            min_area: Self::DEFAULT_MIN_AREA,
            max_area: Self::DEFAULT_MAX_AREA,
        }
    }
}

fn validate_kernel(name: &str, size: u32) -> Result<(), SegmentError> {
    if size == 0 {
        return Err(SegmentError::InvalidParameter(format!(
            "{name} must be positive"
        )));
    }
    Ok(())
}

fn validate_area_bounds(min_area: u64, max_area: u64) -> Result<(), SegmentError> {
    if min_area > max_area {
        return Err(SegmentError::InvalidParameter(format!(
            "min_area ({min_area}) exceeds max_area ({max_area})"
        )));
    }
    Ok(())
}

/// Output of the direct (threshold + connected components) path.
#[derive(Debug, Clone)]
pub struct DirectResult {
    /// Union of all kept components (255 inside, 0 elsewhere).
    pub overlay: GrayImage,
    /// Kept components in raster discovery order.
    pub components: Vec<ComponentRecord>,
    /// Statistics over the kept component areas.
    pub stats: AreaStats,
}

/// Output of the watershed path.
#[derive(Debug, Clone)]
pub struct WatershedResult {
    /// Number of kept regions.
    pub count: usize,
    /// Normalized image with each kept region's number drawn at its
    /// centroid.
    pub overlay: RgbImage,
    /// Kept regions, numbered 1..=count in discovery order.
    pub kept: Vec<ComponentRecord>,
    /// Statistics over the kept region areas.
    pub stats: AreaStats,
    /// Intermediate rasters for diagnostics and tests.
    pub debug: DebugBundle,
}

/// Every intermediate of a watershed run.
#[derive(Debug, Clone)]
pub struct DebugBundle {
    /// Selected channel stretched to 0-255.
    pub normalized: GrayImage,
    /// Gaussian-smoothed normalized image (the flood surface).
    pub blurred: GrayImage,
    /// Otsu foreground mask.
    pub binary: GrayImage,
    /// Unsmoothed Euclidean distance to background.
    pub distance: DistanceImage,
    /// Seed mask (natural and supplemental seeds).
    pub seeds: GrayImage,
    /// Watershed label grid before area filtering.
    pub labels: LabelGrid,
    /// Threshold chosen by Otsu's method.
    pub otsu_threshold: u8,
}

/// Errors that can occur during segmentation.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// Failed to decode the input image bytes.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The image is neither single-channel nor three-channel.
    #[error("unsupported image layout: {0}")]
    InvalidShape(String),

    /// A configuration value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
