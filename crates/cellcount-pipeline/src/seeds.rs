//! Seed generation for the watershed: one or more seeds per object.
//!
//! Natural seeds are local maxima of the smoothed distance field that rise
//! above `peak_thresh_frac` of the global raw maximum. Objects too small or
//! too flat to produce a qualifying maximum can then be *supplemented*:
//! every 8-connected foreground component whose area is within the kept
//! range and which received no natural seed gets a single seed at its
//! deepest pixel.
//!
//! The local-maximum window is an elliptical (disk) structuring element
//! of the configured size. A pixel qualifies when its value equals the
//! window maximum, so flat plateaus yield connected runs of seeds that the
//! segmenter merges into one marker.

use image::{GrayImage, Luma};

use crate::blur::odd_kernel_size;
use crate::distance::{DistanceField, DistanceImage};
use crate::label::{self, Connectivity};
use crate::threshold::FOREGROUND;

/// Where a seed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOrigin {
    /// A qualifying local maximum.
    Natural,
    /// Injected into a component that had no natural seed.
    Supplemental,
}

/// A single seed pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    pub x: u32,
    pub y: u32,
    /// Raw distance-field value at the seed.
    pub distance: f32,
    pub origin: SeedOrigin,
}

/// Parameters for [`generate_seeds`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedParams {
    /// Local-maximum window size (even values are bumped to odd).
    pub maxima_kernel: u32,
    /// Fraction of the raw distance maximum a seed must exceed.
    pub peak_thresh_frac: f64,
    /// Inject seeds into unseeded components.
    pub supplement: bool,
    /// Inclusive area range for supplementation.
    pub min_area: u64,
    pub max_area: u64,
}

/// Seeds as a mask and as a list.
#[derive(Debug, Clone)]
pub struct Seeds {
    /// 255 at seed pixels, 0 elsewhere.
    pub mask: GrayImage,
    /// Natural seeds in raster order, then supplemental seeds in component
    /// order.
    pub points: Vec<Seed>,
}

impl Seeds {
    /// Number of natural seed pixels.
    #[must_use]
    pub fn natural_count(&self) -> usize {
        self.points
            .iter()
            .filter(|s| s.origin == SeedOrigin::Natural)
            .count()
    }

    /// Number of supplemented components.
    #[must_use]
    pub fn supplemental_count(&self) -> usize {
        self.points.len() - self.natural_count()
    }
}

/// Offsets of an elliptical structuring element of `size × size`.
///
/// Row `dy` spans `-dx..=dx` with `dx = round(sqrt(r² - dy²))`, `r = size / 2`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn ellipse_offsets(size: u32) -> Vec<(i32, i32)> {
    let r = (odd_kernel_size(size.max(1)) / 2) as i32;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        let dx = f64::from(r * r - dy * dy).sqrt().round() as i32;
        for ox in -dx..=dx {
            offsets.push((ox, dy));
        }
    }
    offsets
}

/// Pixels whose value equals the maximum over the elliptical window, as a
/// mask (`FOREGROUND` at maxima).
///
/// Window positions outside the image are ignored.
#[must_use]
pub fn local_maxima(field: &DistanceImage, window: u32) -> GrayImage {
    let offsets = ellipse_offsets(window);
    let (w, h) = (i64::from(field.width()), i64::from(field.height()));
    GrayImage::from_fn(field.width(), field.height(), |x, y| {
        let value = field.get_pixel(x, y).0[0];
        let is_max = offsets.iter().all(|&(dx, dy)| {
            let nx = i64::from(x) + i64::from(dx);
            let ny = i64::from(y) + i64::from(dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                return true;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let neighbour = field.get_pixel(nx as u32, ny as u32).0[0];
            value >= neighbour
        });
        Luma([if is_max { FOREGROUND } else { 0 }])
    })
}

/// Build the seed mask and list for a foreground `mask`.
#[must_use = "returns the seeds"]
#[allow(clippy::cast_possible_truncation)]
pub fn generate_seeds(distance: &DistanceField, mask: &GrayImage, params: &SeedParams) -> Seeds {
    let (width, height) = mask.dimensions();
    let peak = (params.peak_thresh_frac * f64::from(distance.max())) as f32;
    let maxima = local_maxima(&distance.smoothed, params.maxima_kernel);

    let mut seed_mask = GrayImage::new(width, height);
    let mut points = Vec::new();
    for (x, y, &Luma([is_max])) in maxima.enumerate_pixels() {
        let smoothed = distance.smoothed.get_pixel(x, y).0[0];
        if is_max != 0 && smoothed > peak && mask.get_pixel(x, y).0[0] != 0 {
            seed_mask.put_pixel(x, y, Luma([FOREGROUND]));
            points.push(Seed {
                x,
                y,
                distance: distance.raw.get_pixel(x, y).0[0],
                origin: SeedOrigin::Natural,
            });
        }
    }
    tracing::debug!(natural = points.len(), peak, "local maxima seeds");

    if params.supplement {
        let supplemental = supplement_seeds(distance, mask, &seed_mask, params);
        for seed in &supplemental {
            seed_mask.put_pixel(seed.x, seed.y, Luma([FOREGROUND]));
        }
        tracing::debug!(supplemented = supplemental.len(), "seed supplementation");
        points.extend(supplemental);
    }

    Seeds {
        mask: seed_mask,
        points,
    }
}

#[derive(Debug, Clone, Copy)]
struct ComponentScan {
    area: u64,
    seeded: bool,
    deepest: Option<(u32, u32, f32)>,
}

/// One seed per in-range 8-connected component lacking a natural seed.
fn supplement_seeds(
    distance: &DistanceField,
    mask: &GrayImage,
    seed_mask: &GrayImage,
    params: &SeedParams,
) -> Vec<Seed> {
    let labeled = label::label_components(mask, Connectivity::Eight);
    let mut scans = vec![
        ComponentScan {
            area: 0,
            seeded: false,
            deepest: None,
        };
        labeled.count as usize + 1
    ];

    for (x, y, &Luma([id])) in labeled.labels.enumerate_pixels() {
        let Ok(id) = usize::try_from(id) else {
            continue;
        };
        if id == 0 {
            continue;
        }
        let scan = &mut scans[id];
        scan.area += 1;
        scan.seeded |= seed_mask.get_pixel(x, y).0[0] != 0;
        let d = distance.raw.get_pixel(x, y).0[0];
        if scan.deepest.is_none_or(|(_, _, best)| d > best) {
            scan.deepest = Some((x, y, d));
        }
    }

    scans
        .iter()
        .skip(1)
        .filter(|s| !s.seeded && (params.min_area..=params.max_area).contains(&s.area))
        .filter_map(|s| s.deepest)
        .map(|(x, y, distance)| Seed {
            x,
            y,
            distance,
            origin: SeedOrigin::Supplemental,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::distance_field;

    fn disk_mask(size: u32, cx: i32, cy: i32, r: i32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let dx = i32::try_from(x).unwrap_or(0) - cx;
            let dy = i32::try_from(y).unwrap_or(0) - cy;
            if dx * dx + dy * dy <= r * r {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn params(frac: f64, supplement: bool) -> SeedParams {
        SeedParams {
            maxima_kernel: 7,
            peak_thresh_frac: frac,
            supplement,
            min_area: 1,
            max_area: 100_000,
        }
    }

    #[test]
    fn ellipse_three_is_cross() {
        let mut offsets = ellipse_offsets(3);
        offsets.sort_unstable();
        assert_eq!(offsets, vec![(-1, 0), (0, -1), (0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn ellipse_seven_rows() {
        let offsets = ellipse_offsets(7);
        let row_width = |dy| offsets.iter().filter(|&&(_, oy)| oy == dy).count();
        assert_eq!(row_width(0), 7);
        assert_eq!(row_width(-3), 1);
        assert_eq!(row_width(3), 1);
        assert_eq!(row_width(2), 5);
    }

    #[test]
    fn single_peak_is_local_max() {
        let field = DistanceImage::from_fn(9, 9, |x, y| {
            let dx = f32::from(u8::try_from(x).unwrap_or(0)) - 4.0;
            let dy = f32::from(u8::try_from(y).unwrap_or(0)) - 4.0;
            Luma([10.0 - dx.abs() - dy.abs()])
        });
        let maxima = local_maxima(&field, 5);
        let hits: Vec<(u32, u32)> = maxima
            .enumerate_pixels()
            .filter(|&(_, _, p)| p.0[0] == FOREGROUND)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(hits, vec![(4, 4)]);
    }

    #[test]
    fn disk_gets_natural_seed_near_center() {
        let mask = disk_mask(60, 30, 30, 15);
        let field = distance_field(&mask);
        let seeds = generate_seeds(&field, &mask, &params(0.35, false));
        assert!(seeds.natural_count() >= 1);
        for s in &seeds.points {
            assert!(s.x.abs_diff(30) <= 2 && s.y.abs_diff(30) <= 2, "{s:?}");
        }
    }

    #[test]
    fn full_fraction_suppresses_natural_seeds() {
        let mask = disk_mask(60, 30, 30, 15);
        let field = distance_field(&mask);
        let seeds = generate_seeds(&field, &mask, &params(1.0, false));
        assert!(seeds.points.is_empty());
    }

    #[test]
    fn supplementation_seeds_deepest_pixel() {
        let mask = disk_mask(60, 30, 30, 15);
        let field = distance_field(&mask);
        let seeds = generate_seeds(&field, &mask, &params(1.0, true));
        assert_eq!(seeds.points.len(), 1);
        let seed = seeds.points[0];
        assert_eq!(seed.origin, SeedOrigin::Supplemental);
        assert_eq!((seed.x, seed.y), (30, 30));
        assert!((seed.distance - field.max()).abs() < f32::EPSILON);
        assert_eq!(seeds.mask.get_pixel(30, 30).0[0], FOREGROUND);
    }

    #[test]
    fn supplementation_only_fills_unseeded_component() {
        // A large disk clears the peak threshold on its own; a small disk
        // elsewhere in the frame is too shallow and needs a seed injected.
        let mut mask = disk_mask(64, 20, 20, 12);
        for (x, y, p) in disk_mask(64, 50, 50, 3).enumerate_pixels() {
            if p.0[0] != 0 {
                mask.put_pixel(x, y, *p);
            }
        }
        let field = distance_field(&mask);
        let p = SeedParams {
            max_area: 10_000,
            ..params(0.35, true)
        };
        let seeds = generate_seeds(&field, &mask, &p);

        assert!(seeds.natural_count() >= 1);
        assert_eq!(seeds.supplemental_count(), 1);
        let inside = |s: &Seed, cx: u32, cy: u32, r: u32| {
            let (dx, dy) = (s.x.abs_diff(cx), s.y.abs_diff(cy));
            dx * dx + dy * dy <= r * r
        };
        for s in &seeds.points {
            match s.origin {
                SeedOrigin::Natural => assert!(inside(s, 20, 20, 12), "{s:?}"),
                SeedOrigin::Supplemental => assert!(inside(s, 50, 50, 3), "{s:?}"),
            }
        }
    }

    #[test]
    fn supplementation_respects_area_range() {
        let mask = disk_mask(60, 30, 30, 15);
        let field = distance_field(&mask);
        let p = SeedParams {
            min_area: 10,
            max_area: 100,
            ..params(1.0, true)
        };
        let seeds = generate_seeds(&field, &mask, &p);
        assert!(seeds.points.is_empty());
    }

    #[test]
    fn supplementation_tie_takes_first_in_raster_order() {
        let mask = GrayImage::from_fn(7, 5, |x, y| {
            if (1..6).contains(&x) && (1..4).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let field = distance_field(&mask);
        let seeds = generate_seeds(&field, &mask, &params(1.0, true));
        assert_eq!(seeds.points.len(), 1);
        assert_eq!((seeds.points[0].x, seeds.points[0].y), (2, 2));
    }

    #[test]
    fn empty_mask_has_no_seeds() {
        let mask = GrayImage::new(10, 10);
        let field = distance_field(&mask);
        let seeds = generate_seeds(&field, &mask, &params(0.35, true));
        assert!(seeds.points.is_empty());
        assert_eq!(seeds.supplemental_count(), 0);
    }
}
