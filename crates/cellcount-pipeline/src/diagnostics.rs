//! Pipeline diagnostics: timing, counts and thresholds for each stage.
//!
//! [`process_with_diagnostics`] runs the watershed path stage by stage,
//! timing each step with a caller-supplied [`Clock`], and returns the
//! result together with a [`PipelineDiagnostics`]. The pipeline crate
//! stays free of platform timing code; the CLI plugs in
//! `std::time::Instant`.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::pipeline::{Normalized, PipelineStage};
use crate::types::{Dimensions, SegmentError, WatershedConfig, WatershedResult};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single watershed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    pub preprocess: StageDiagnostics,
    pub threshold: StageDiagnostics,
    pub distance: StageDiagnostics,
    pub seeds: StageDiagnostics,
    pub watershed: StageDiagnostics,
    pub filter: StageDiagnostics,
    /// Overlay drawing and statistics.
    pub render: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    pub summary: PipelineSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Channel extraction, normalization and blur.
    Preprocess {
        width: u32,
        height: u32,
        channel: u8,
        blur_kernel: u32,
    },
    /// Otsu binarization.
    Threshold {
        threshold: u8,
        foreground_pixels: u64,
        total_pixels: u64,
    },
    /// Distance transform.
    Distance {
        /// Largest raw distance in pixels.
        max_distance: f32,
    },
    /// Seed generation.
    Seeds {
        /// Natural seed pixels.
        natural: usize,
        /// Components that received a supplemental seed.
        supplemented: usize,
    },
    /// Watershed flood.
    Watershed { markers: u32, boundary_pixels: u64 },
    /// Area filtering.
    Filter {
        min_area: u64,
        max_area: u64,
        regions_before: usize,
        kept: usize,
    },
    /// Overlay rendering.
    Render { numbers_drawn: usize },
}

/// High-level summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub image_width: u32,
    pub image_height: u32,
    pub pixel_count: u64,
    pub otsu_threshold: u8,
    /// Final region count.
    pub count: usize,
}

/// Run the watershed path with per-stage timing.
///
/// # Errors
///
/// Returns the same errors as [`crate::watershed_count`].
pub fn process_with_diagnostics<C: Clock>(
    image: &DynamicImage,
    config: &WatershedConfig,
    clock: &C,
) -> Result<(WatershedResult, PipelineDiagnostics), SegmentError> {
    let total_start = clock.now();

    let start = clock.now();
    let normalized = Normalized::from_image(image, config.clone())?;
    let preprocess = timed(clock, &start, &normalized);

    let start = clock.now();
    let thresholded = normalized.threshold();
    let threshold = timed(clock, &start, &thresholded);
    let otsu_threshold = thresholded.otsu_threshold();

    let start = clock.now();
    let mapped = thresholded.distance();
    let distance = timed(clock, &start, &mapped);

    let start = clock.now();
    let seeded = mapped.seed();
    let seeds = timed(clock, &start, &seeded);

    let start = clock.now();
    let segmented = seeded.segment();
    let watershed = timed(clock, &start, &segmented);

    let start = clock.now();
    let filtered = segmented.filter();
    let filter = timed(clock, &start, &filtered);

    let start = clock.now();
    let result = filtered.into_result();
    let render = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Render {
            numbers_drawn: result.kept.iter().filter(|r| r.area > 0).count(),
        },
    };

    let total_duration = clock.elapsed(&total_start);
    let (width, height) = result.debug.labels.dimensions();
    let dimensions = Dimensions { width, height };
    let diagnostics = PipelineDiagnostics {
        preprocess,
        threshold,
        distance,
        seeds,
        watershed,
        filter,
        render,
        total_duration,
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            otsu_threshold,
            count: result.count,
        },
    };
    Ok((result, diagnostics))
}

fn timed<C: Clock, S: PipelineStage>(clock: &C, start: &C::Instant, stage: &S) -> StageDiagnostics {
    StageDiagnostics {
        duration: clock.elapsed(start),
        metrics: stage.metrics(),
    }
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Preprocess", &self.preprocess),
            ("Threshold", &self.threshold),
            ("Distance", &self.distance),
            ("Seeds", &self.seeds),
            ("Watershed", &self.watershed),
            ("Filter", &self.filter),
            ("Render", &self.render),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Otsu threshold: {}  |  Count: {}",
            self.summary.otsu_threshold, self.summary.count,
        ));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Preprocess {
            width,
            height,
            channel,
            blur_kernel,
        } => format!("{width}x{height} channel={channel} blur={blur_kernel}"),
        StageMetrics::Threshold {
            threshold,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let coverage = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("t={threshold} foreground={foreground_pixels} ({coverage:.1}%)")
        }
        StageMetrics::Distance { max_distance } => format!("max={max_distance:.2}px"),
        StageMetrics::Seeds {
            natural,
            supplemented,
        } => format!("{natural} natural, {supplemented} supplemented"),
        StageMetrics::Watershed {
            markers,
            boundary_pixels,
        } => format!("{markers} markers, {boundary_pixels} boundary px"),
        StageMetrics::Filter {
            min_area,
            max_area,
            regions_before,
            kept,
        } => format!("[{min_area}, {max_area}] {regions_before}->{kept} regions"),
        StageMetrics::Render { numbers_drawn } => format!("{numbers_drawn} numbers"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use image::{GrayImage, Luma};

    use super::*;

    /// Advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn two_disks() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(80, 60, |x, y| {
            let near = |cx: i64, cy: i64| {
                let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
                dx * dx + dy * dy <= 100
            };
            if near(20, 30) || near(60, 30) { Luma([200]) } else { Luma([10]) }
        }))
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_match_plain_run() {
        let clock = TickClock {
            ticks: Cell::new(0),
        };
        let image = two_disks();
        let config = WatershedConfig::default();
        let (result, diag) = process_with_diagnostics(&image, &config, &clock).unwrap();
        let plain = crate::watershed_count(&image, &config).unwrap();

        assert_eq!(result.count, plain.count);
        assert_eq!(diag.summary.count, 2);
        assert_eq!(diag.summary.image_width, 80);
        assert_eq!(diag.summary.pixel_count, 4800);
        assert!(diag.total_duration > diag.preprocess.duration);
        assert_eq!(
            diag.filter.metrics,
            StageMetrics::Filter {
                min_area: config.min_area,
                max_area: config.max_area,
                regions_before: 2,
                kept: 2,
            }
        );
    }

    #[test]
    fn invalid_config_is_reported() {
        let clock = TickClock {
            ticks: Cell::new(0),
        };
        let config = WatershedConfig {
            blur_kernel: 0,
            ..WatershedConfig::default()
        };
        let result = process_with_diagnostics(&two_disks(), &config, &clock);
        assert!(matches!(result, Err(SegmentError::InvalidParameter(_))));
    }

    #[test]
    fn report_lists_every_stage() {
        let clock = TickClock {
            ticks: Cell::new(0),
        };
        let (_, diag) =
            process_with_diagnostics(&two_disks(), &WatershedConfig::default(), &clock).unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        for stage in ["Preprocess", "Threshold", "Distance", "Seeds", "Watershed", "Filter", "Render"] {
            assert!(report.contains(stage), "missing {stage}");
        }
        assert!(report.contains("Count: 2"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let clock = TickClock {
            ticks: Cell::new(0),
        };
        let (_, diag) =
            process_with_diagnostics(&two_disks(), &WatershedConfig::default(), &clock).unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["preprocess"]["duration"].as_f64().unwrap() - 0.001).abs() < 1e-9);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.summary.count, diag.summary.count);
    }
}
