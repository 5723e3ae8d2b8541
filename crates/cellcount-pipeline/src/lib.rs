//! cellcount-pipeline: count cells and nuclei in microscopy images (sans-IO).
//!
//! Two segmentation paths share the same front end:
//!
//! - **direct**: channel -> blur -> fixed threshold -> 4-connected
//!   components -> area filter. Suited to well separated objects.
//! - **watershed**: channel -> normalize -> blur -> Otsu threshold ->
//!   distance transform -> seeds (with supplementation) -> marker-controlled
//!   watershed -> area filter -> numbered overlay. Splits touching objects.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! [`DynamicImage`]s and returns structured data. File reading, CSV and PNG
//! encoding live in `cellcount-export` and the `cellcount` CLI.
//!
//! Every call is a pure function of its image and config: nothing is
//! cached between calls, and the same input always produces the same
//! labels.

pub mod area;
pub mod blur;
pub mod decode;
pub mod diagnostics;
pub mod distance;
pub mod label;
pub mod pipeline;
pub mod preprocess;
pub mod render;
pub mod roi;
pub mod seeds;
pub mod threshold;
pub mod types;
pub mod watershed;

pub use area::stats;
pub use distance::DistanceImage;
pub use label::LabelGrid;
pub use pipeline::Pipeline;
pub use preprocess::ChannelSelect;
pub use threshold::{Binarizer, ThresholdMethod};
pub use types::{
    AreaStats, BoundingBox, ComponentRecord, DebugBundle, Dimensions, DirectConfig, DirectResult,
    DynamicImage, GrayImage, Point, RgbImage, SegmentError, WatershedConfig, WatershedResult,
};
pub use watershed::{BACKGROUND, BOUNDARY, UNKNOWN};

/// Count well separated objects with a fixed threshold.
///
/// # Steps
///
/// 1. Reduce to one channel (luminance by default), optionally stretch
/// 2. Gaussian blur
/// 3. Fixed threshold (`pixel > threshold`)
/// 4. 4-connected component labeling
/// 5. Keep components with `min_area <= area <= max_area`
///
/// Touching objects merge into one component; use [`watershed_count`] to
/// split them.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidParameter`] for an invalid config and
/// [`SegmentError::InvalidShape`] for an image that is neither single- nor
/// three-channel.
pub fn direct_segment(image: &DynamicImage, config: &DirectConfig) -> Result<DirectResult, SegmentError> {
    config.validate()?;
    let pre = preprocess::preprocess(image, config.channel, config.normalize, config.blur_kernel)?;
    let binary = ThresholdMethod::Fixed(config.threshold).binarize(&pre.blurred);
    let labeled = label::label_components(&binary.mask, label::Connectivity::Four);
    let components = area::AreaFilter::new(config.min_area, config.max_area)
        .apply(label::measure_regions(&labeled.labels));
    tracing::debug!(
        components = labeled.count,
        kept = components.len(),
        threshold = config.threshold,
        "direct segmentation"
    );

    let overlay = render::union_overlay(&labeled.labels, &components);
    let stats = area::stats(&components);
    tracing::info!(count = components.len(), "direct count");
    Ok(DirectResult {
        overlay,
        components,
        stats,
    })
}

/// Count objects, splitting touching ones with a seeded watershed.
///
/// Runs every [`Pipeline`] stage in sequence. Kept regions are numbered
/// `1..=count` in ascending watershed-label order, which is the raster
/// order in which their seeds were discovered.
///
/// # Errors
///
/// Returns [`SegmentError::InvalidParameter`] for an invalid config and
/// [`SegmentError::InvalidShape`] for an image that is neither single- nor
/// three-channel.
pub fn watershed_count(image: &DynamicImage, config: &WatershedConfig) -> Result<WatershedResult, SegmentError> {
    Ok(pipeline::Normalized::from_image(image, config.clone())?
        .threshold()
        .distance()
        .seed()
        .segment()
        .filter()
        .into_result())
}
