//! Staged watershed pipeline: advance step by step, inspecting each
//! intermediate before continuing.
//!
//! [`crate::watershed_count`] runs every stage in one call. [`Pipeline`]
//! lets the caller drive execution instead:
//!
//! ```rust
//! # use cellcount_pipeline::{Pipeline, WatershedConfig, SegmentError};
//! # fn run(image: image::DynamicImage) -> Result<(), SegmentError> {
//! let filtered = Pipeline::new(image, WatershedConfig::default())
//!     .preprocess()?
//!     .threshold()
//!     .distance()
//!     .seed()
//!     .segment()
//!     .filter();
//!
//! println!("{} regions kept", filtered.kept().len());
//! let result = filtered.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, carrying
//! the intermediates later stages and the [`DebugBundle`] need. Only
//! [`Pending::preprocess`] can fail: it validates the config before any
//! pixel is touched.

use image::DynamicImage;

use crate::area::{self, AreaFilter};
use crate::diagnostics::StageMetrics;
use crate::distance::{self, DistanceField};
use crate::label;
use crate::preprocess::{self, ChannelSelect};
use crate::render;
use crate::seeds::{self, SeedParams, Seeds};
use crate::threshold::{Binarized, Binarizer, ThresholdMethod};
use crate::types::{
    ComponentRecord, DebugBundle, Dimensions, GrayImage, SegmentError, WatershedConfig,
    WatershedResult,
};
use crate::watershed::{self, BACKGROUND, BOUNDARY, Segmentation};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing, call .preprocess() to continue"]
pub struct Pending {
    config: WatershedConfig,
    image: DynamicImage,
}

impl Pending {
    /// The input image.
    #[must_use]
    pub const fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Validate the config, then extract, normalize and blur the
    /// analyzed channel.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidParameter`] for an invalid config
    /// and [`SegmentError::InvalidShape`] for an unsupported layout.
    pub fn preprocess(self) -> Result<Normalized, SegmentError> {
        Normalized::from_image(&self.image, self.config)
    }
}

// ───────────────────────── Stage 1: Normalized ───────────────────────

/// Pipeline state after channel extraction, normalization and blur.
#[must_use = "pipeline stages are consumed by advancing, call .threshold() to continue"]
pub struct Normalized {
    config: WatershedConfig,
    normalized: GrayImage,
    blurred: GrayImage,
}

impl Normalized {
    /// Run the first stage directly on a borrowed image.
    ///
    /// # Errors
    ///
    /// See [`Pending::preprocess`].
    pub fn from_image(image: &DynamicImage, config: WatershedConfig) -> Result<Self, SegmentError> {
        config.validate()?;
        let out = preprocess::preprocess(
            image,
            ChannelSelect::Index(config.channel),
            true,
            config.blur_kernel,
        )?;
        Ok(Self {
            config,
            normalized: out.normalized,
            blurred: out.blurred,
        })
    }

    /// The channel stretched to 0-255.
    #[must_use]
    pub const fn normalized(&self) -> &GrayImage {
        &self.normalized
    }

    /// The smoothed normalized image.
    #[must_use]
    pub const fn blurred(&self) -> &GrayImage {
        &self.blurred
    }

    /// Split foreground from background with Otsu's method.
    pub fn threshold(self) -> Thresholded {
        let binarized = ThresholdMethod::Otsu.binarize(&self.blurred);
        tracing::debug!(
            threshold = binarized.threshold,
            foreground = binarized.foreground_count(),
            "otsu threshold"
        );
        Thresholded {
            config: self.config,
            normalized: self.normalized,
            blurred: self.blurred,
            binarized,
        }
    }
}

// ───────────────────────── Stage 2: Thresholded ──────────────────────

/// Pipeline state after binarization.
#[must_use = "pipeline stages are consumed by advancing, call .distance() to continue"]
pub struct Thresholded {
    config: WatershedConfig,
    normalized: GrayImage,
    blurred: GrayImage,
    binarized: Binarized,
}

impl Thresholded {
    /// The foreground mask.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binarized.mask
    }

    /// The threshold Otsu's method picked.
    #[must_use]
    pub const fn otsu_threshold(&self) -> u8 {
        self.binarized.threshold
    }

    /// Compute the distance field of the foreground mask.
    pub fn distance(self) -> DistanceMapped {
        let field = distance::distance_field(&self.binarized.mask);
        DistanceMapped {
            config: self.config,
            normalized: self.normalized,
            blurred: self.blurred,
            binarized: self.binarized,
            field,
        }
    }
}

// ───────────────────────── Stage 3: DistanceMapped ───────────────────

/// Pipeline state after the distance transform.
#[must_use = "pipeline stages are consumed by advancing, call .seed() to continue"]
pub struct DistanceMapped {
    config: WatershedConfig,
    normalized: GrayImage,
    blurred: GrayImage,
    binarized: Binarized,
    field: DistanceField,
}

impl DistanceMapped {
    /// Raw and smoothed distance images.
    #[must_use]
    pub const fn field(&self) -> &DistanceField {
        &self.field
    }

    /// Find natural seeds and supplement unseeded components.
    pub fn seed(self) -> Seeded {
        let params = SeedParams {
            maxima_kernel: self.config.maxima_kernel,
            peak_thresh_frac: self.config.peak_thresh_frac,
            supplement: self.config.seed_supplement,
            min_area: self.config.min_area,
            max_area: self.config.max_area,
        };
        let seeds = seeds::generate_seeds(&self.field, &self.binarized.mask, &params);
        Seeded {
            config: self.config,
            normalized: self.normalized,
            blurred: self.blurred,
            binarized: self.binarized,
            field: self.field,
            seeds,
        }
    }
}

// ───────────────────────── Stage 4: Seeded ───────────────────────────

/// Pipeline state after seed generation.
#[must_use = "pipeline stages are consumed by advancing, call .segment() to continue"]
pub struct Seeded {
    config: WatershedConfig,
    normalized: GrayImage,
    blurred: GrayImage,
    binarized: Binarized,
    field: DistanceField,
    seeds: Seeds,
}

impl Seeded {
    /// Seed mask and list.
    #[must_use]
    pub const fn seeds(&self) -> &Seeds {
        &self.seeds
    }

    /// Flood the blurred image from the seed markers.
    pub fn segment(self) -> Segmented {
        let segmentation = watershed::segment(
            &self.blurred,
            &self.seeds.mask,
            &self.binarized.mask,
            self.config.dilate_iters,
        );
        Segmented {
            config: self.config,
            normalized: self.normalized,
            blurred: self.blurred,
            binarized: self.binarized,
            field: self.field,
            seeds: self.seeds,
            segmentation,
        }
    }
}

// ───────────────────────── Stage 5: Segmented ────────────────────────

/// Pipeline state after the watershed flood.
#[must_use = "pipeline stages are consumed by advancing, call .filter() to continue"]
pub struct Segmented {
    config: WatershedConfig,
    normalized: GrayImage,
    blurred: GrayImage,
    binarized: Binarized,
    field: DistanceField,
    seeds: Seeds,
    segmentation: Segmentation,
}

impl Segmented {
    /// The watershed label grid and marker count.
    #[must_use]
    pub const fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    /// Measure the regions, keep those within the area bounds, and number
    /// them 1..=K.
    pub fn filter(self) -> Filtered {
        let regions: Vec<ComponentRecord> = label::measure_regions(&self.segmentation.labels)
            .into_iter()
            .filter(|r| r.id != BACKGROUND.unsigned_abs())
            .collect();
        let regions_before = regions.len();
        let kept = area::renumber(
            AreaFilter::new(self.config.min_area, self.config.max_area).apply(regions),
        );
        tracing::debug!(regions = regions_before, kept = kept.len(), "area filter");
        Filtered {
            config: self.config,
            normalized: self.normalized,
            blurred: self.blurred,
            binarized: self.binarized,
            field: self.field,
            seeds: self.seeds,
            segmentation: self.segmentation,
            regions_before,
            kept,
        }
    }
}

// ───────────────────────── Stage 6: Filtered ─────────────────────────

/// Final pipeline state: kept regions are known.
#[must_use = "call .into_result() to build the overlay and statistics"]
pub struct Filtered {
    config: WatershedConfig,
    normalized: GrayImage,
    blurred: GrayImage,
    binarized: Binarized,
    field: DistanceField,
    seeds: Seeds,
    segmentation: Segmentation,
    regions_before: usize,
    kept: Vec<ComponentRecord>,
}

impl Filtered {
    /// Kept regions, numbered 1..=K.
    #[must_use]
    pub fn kept(&self) -> &[ComponentRecord] {
        &self.kept
    }

    /// Number of regions measured before the area filter.
    #[must_use]
    pub const fn regions_before(&self) -> usize {
        self.regions_before
    }

    /// Image dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.normalized.width(),
            height: self.normalized.height(),
        }
    }

    /// Render the numbered overlay and assemble the result.
    pub fn into_result(self) -> WatershedResult {
        let overlay = render::numbered_overlay(&self.normalized, &self.kept);
        let stats = area::stats(&self.kept);
        tracing::info!(count = self.kept.len(), "watershed count");
        WatershedResult {
            count: self.kept.len(),
            overlay,
            stats,
            kept: self.kept,
            debug: DebugBundle {
                normalized: self.normalized,
                blurred: self.blurred,
                binary: self.binarized.mask,
                distance: self.field.raw,
                seeds: self.seeds.mask,
                labels: self.segmentation.labels,
                otsu_threshold: self.binarized.threshold,
            },
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages after [`Pending`].
pub const STAGE_COUNT: usize = 6;

/// Trait implemented by every processed stage, enabling uniform
/// iteration through [`Stage`].
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage.
    const NAME: &str;

    /// Zero-based index of this stage (`0` for [`Normalized`]).
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;

    /// Advance to the next stage, or `None` at the final stage.
    fn next(self) -> Option<Stage>;

    /// Run all remaining stages and build the result.
    fn complete(self) -> WatershedResult;
}

impl PipelineStage for Normalized {
    const NAME: &str = "preprocess";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Preprocess {
            width: self.normalized.width(),
            height: self.normalized.height(),
            channel: self.config.channel,
            blur_kernel: self.config.blur_kernel,
        }
    }

    fn next(self) -> Option<Stage> {
        Some(self.threshold().into())
    }

    fn complete(self) -> WatershedResult {
        self.threshold().complete()
    }
}

impl PipelineStage for Thresholded {
    const NAME: &str = "threshold";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        let (w, h) = self.binarized.mask.dimensions();
        StageMetrics::Threshold {
            threshold: self.binarized.threshold,
            foreground_pixels: self.binarized.foreground_count(),
            total_pixels: u64::from(w) * u64::from(h),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(self.distance().into())
    }

    fn complete(self) -> WatershedResult {
        self.distance().complete()
    }
}

impl PipelineStage for DistanceMapped {
    const NAME: &str = "distance";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Distance {
            max_distance: self.field.max(),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(self.seed().into())
    }

    fn complete(self) -> WatershedResult {
        self.seed().complete()
    }
}

impl PipelineStage for Seeded {
    const NAME: &str = "seeds";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Seeds {
            natural: self.seeds.natural_count(),
            supplemented: self.seeds.supplemental_count(),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(self.segment().into())
    }

    fn complete(self) -> WatershedResult {
        self.segment().complete()
    }
}

impl PipelineStage for Segmented {
    const NAME: &str = "watershed";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        let boundary_pixels = self
            .segmentation
            .labels
            .iter()
            .filter(|&&v| v == BOUNDARY)
            .count() as u64;
        StageMetrics::Watershed {
            markers: self.segmentation.markers,
            boundary_pixels,
        }
    }

    fn next(self) -> Option<Stage> {
        Some(self.filter().into())
    }

    fn complete(self) -> WatershedResult {
        self.filter().complete()
    }
}

impl PipelineStage for Filtered {
    const NAME: &str = "filter";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Filter {
            min_area: self.config.min_area,
            max_area: self.config.max_area,
            regions_before: self.regions_before,
            kept: self.kept.len(),
        }
    }

    fn next(self) -> Option<Stage> {
        None
    }

    fn complete(self) -> WatershedResult {
        self.into_result()
    }
}

/// Any processed stage, for callers that loop instead of chaining.
///
/// ```rust
/// # use cellcount_pipeline::{Pipeline, WatershedConfig, SegmentError};
/// # use cellcount_pipeline::pipeline::{Advance, Stage};
/// # fn run(image: image::DynamicImage) -> Result<(), SegmentError> {
/// let mut stage: Stage = Pipeline::new(image, WatershedConfig::default())
///     .preprocess()?
///     .into();
/// loop {
///     println!("{}: {:?}", stage.name(), stage.metrics());
///     match stage.advance() {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete();
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Normalized`].
    Normalized(Normalized),
    /// See [`Thresholded`].
    Thresholded(Thresholded),
    /// See [`DistanceMapped`].
    DistanceMapped(DistanceMapped),
    /// See [`Seeded`].
    Seeded(Seeded),
    /// See [`Segmented`].
    Segmented(Segmented),
    /// See [`Filtered`].
    Filtered(Filtered),
}

/// Result of [`Stage::advance`].
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this stage.
    Next(Stage),
    /// The pipeline was already at the final stage, returned unchanged.
    Complete(Stage),
}

macro_rules! delegate {
    ($self:ident, $method:ident) => {
        match $self {
            Self::Normalized(s) => s.$method(),
            Self::Thresholded(s) => s.$method(),
            Self::DistanceMapped(s) => s.$method(),
            Self::Seeded(s) => s.$method(),
            Self::Segmented(s) => s.$method(),
            Self::Filtered(s) => s.$method(),
        }
    };
}

macro_rules! delegate_const {
    ($self:ident, $name:ident) => {
        match $self {
            Self::Normalized(_) => Normalized::$name,
            Self::Thresholded(_) => Thresholded::$name,
            Self::DistanceMapped(_) => DistanceMapped::$name,
            Self::Seeded(_) => Seeded::$name,
            Self::Segmented(_) => Segmented::$name,
            Self::Filtered(_) => Filtered::$name,
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        delegate_const!(self, NAME)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub const fn index(&self) -> usize {
        delegate_const!(self, INDEX)
    }

    /// Metrics of the current stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Filtered(_))
    }

    /// Advance one stage, returning `self` unchanged when complete.
    pub fn advance(self) -> Advance {
        if self.is_complete() {
            return Advance::Complete(self);
        }
        // Only the final stage returns `None`, and it was handled above.
        #[allow(clippy::unreachable)]
        let next = delegate!(self, next)
            .unwrap_or_else(|| unreachable!("non-final stage returned None from next()"));
        Advance::Next(next)
    }

    /// Run all remaining stages to completion.
    pub fn complete(self) -> WatershedResult {
        delegate!(self, complete)
    }
}

impl From<Normalized> for Stage {
    fn from(s: Normalized) -> Self {
        Self::Normalized(s)
    }
}

impl From<Thresholded> for Stage {
    fn from(s: Thresholded) -> Self {
        Self::Thresholded(s)
    }
}

impl From<DistanceMapped> for Stage {
    fn from(s: DistanceMapped) -> Self {
        Self::DistanceMapped(s)
    }
}

impl From<Seeded> for Stage {
    fn from(s: Seeded) -> Self {
        Self::Seeded(s)
    }
}

impl From<Segmented> for Stage {
    fn from(s: Segmented) -> Self {
        Self::Segmented(s)
    }
}

impl From<Filtered> for Stage {
    fn from(s: Filtered) -> Self {
        Self::Filtered(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental watershed pipeline.
///
/// Created via [`Pipeline::new`], which stores the image and config
/// without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from an input image and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image: DynamicImage, config: WatershedConfig) -> Pending {
        Pending { config, image }
    }
}
