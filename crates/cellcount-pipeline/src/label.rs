//! Connected-component labeling and per-region measurement.
//!
//! Labeling delegates to [`imageproc::region_labelling::connected_components`],
//! which numbers components `1..=n` in order of first appearance in a
//! row-major scan. Label 0 is background.
//!
//! [`measure_regions`] works on any [`LabelGrid`], so the same code
//! measures connected components and watershed regions.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
pub use imageproc::region_labelling::Connectivity;

use crate::types::{BoundingBox, ComponentRecord, Point};

/// Signed region id per pixel.
///
/// Direct labeling uses 0 for background and `1..` for components; the
/// watershed adds negative and low sentinels (see [`crate::watershed`]).
pub type LabelGrid = Image<Luma<i32>>;

/// Result of labeling a binary mask.
#[derive(Debug, Clone)]
pub struct Labeled {
    /// Component id per pixel, 0 for background.
    pub labels: LabelGrid,
    /// Number of components (the largest id).
    pub count: u32,
}

/// Label the nonzero pixels of `mask`.
#[must_use = "returns the label grid"]
pub fn label_components(mask: &GrayImage, connectivity: Connectivity) -> Labeled {
    let raw = imageproc::region_labelling::connected_components(mask, connectivity, Luma([0u8]));

    // Renumber by first appearance so ids never depend on union-find order.
    let mut renumbered: BTreeMap<u32, i32> = BTreeMap::new();
    let labels = LabelGrid::from_fn(mask.width(), mask.height(), |x, y| {
        let id = raw.get_pixel(x, y).0[0];
        if id == 0 {
            return Luma([0]);
        }
        let next = i32::try_from(renumbered.len() + 1).unwrap_or(i32::MAX);
        Luma([*renumbered.entry(id).or_insert(next)])
    });
    let count = u32::try_from(renumbered.len()).unwrap_or(u32::MAX);
    Labeled { labels, count }
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    area: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: u64,
    sum_y: u64,
}

impl Accumulator {
    const fn new(x: u32, y: u32) -> Self {
        Self {
            area: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            sum_x: 0,
            sum_y: 0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.sum_x += u64::from(x);
        self.sum_y += u64::from(y);
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self, id: u32) -> ComponentRecord {
        let n = self.area as f64;
        ComponentRecord {
            id,
            area: self.area,
            bbox: BoundingBox {
                x: self.min_x,
                y: self.min_y,
                height: self.max_y - self.min_y + 1,
                width: self.max_x - self.min_x + 1,
            },
            centroid: Point::new(self.sum_x as f64 / n, self.sum_y as f64 / n),
        }
    }
}

/// Measure every region with a positive id, in ascending id order.
///
/// Non-positive ids (background, boundary and unknown sentinels) are
/// skipped. Records carry the grid id unchanged.
#[must_use]
pub fn measure_regions(labels: &LabelGrid) -> Vec<ComponentRecord> {
    let mut regions: BTreeMap<u32, Accumulator> = BTreeMap::new();
    for (x, y, &Luma([id])) in labels.enumerate_pixels() {
        let Ok(id) = u32::try_from(id) else {
            continue;
        };
        if id == 0 {
            continue;
        }
        regions
            .entry(id)
            .or_insert_with(|| Accumulator::new(x, y))
            .add(x, y);
    }
    regions
        .into_iter()
        .map(|(id, acc)| acc.finish(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&str]) -> GrayImage {
        let height = u32::try_from(rows.len()).unwrap_or(0);
        let width = u32::try_from(rows.first().map_or(0, |r| r.len())).unwrap_or(0);
        GrayImage::from_fn(width, height, |x, y| {
            let row = rows[y as usize].as_bytes();
            if row[x as usize] == b'#' {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn empty_mask_has_no_components() {
        let labeled = label_components(&GrayImage::new(5, 5), Connectivity::Four);
        assert_eq!(labeled.count, 0);
        assert!(measure_regions(&labeled.labels).is_empty());
    }

    #[test]
    fn diagonal_pixels_depend_on_connectivity() {
        let mask = mask_from_rows(&["#..", ".#.", "..#"]);
        assert_eq!(label_components(&mask, Connectivity::Four).count, 3);
        assert_eq!(label_components(&mask, Connectivity::Eight).count, 1);
    }

    #[test]
    fn ids_follow_raster_order() {
        let mask = mask_from_rows(&["...##", "#....", "#..#."]);
        let labeled = label_components(&mask, Connectivity::Four);
        assert_eq!(labeled.count, 3);
        assert_eq!(labeled.labels.get_pixel(3, 0).0[0], 1);
        assert_eq!(labeled.labels.get_pixel(0, 1).0[0], 2);
        assert_eq!(labeled.labels.get_pixel(3, 2).0[0], 3);
    }

    #[test]
    fn measure_reports_area_bbox_and_centroid() {
        let mask = mask_from_rows(&[".....", ".###.", ".###.", "....."]);
        let labeled = label_components(&mask, Connectivity::Four);
        let records = measure_regions(&labeled.labels);
        assert_eq!(records.len(), 1);
        let r = records[0];
        assert_eq!(r.id, 1);
        assert_eq!(r.area, 6);
        assert_eq!(
            r.bbox,
            BoundingBox {
                x: 1,
                y: 1,
                height: 2,
                width: 3
            }
        );
        assert!((r.centroid.x - 2.0).abs() < 1e-9);
        assert!((r.centroid.y - 1.5).abs() < 1e-9);
    }

    #[test]
    fn measure_skips_sentinels() {
        let grid = LabelGrid::from_fn(3, 1, |x, _| Luma([[-1, 1, 4][x as usize]]));
        let records = measure_regions(&grid);
        let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn areas_sum_to_foreground() {
        let mask = mask_from_rows(&["##..#", "#...#", "..#..", "#####"]);
        let labeled = label_components(&mask, Connectivity::Four);
        let total: u64 = measure_regions(&labeled.labels).iter().map(|r| r.area).sum();
        let foreground = mask.pixels().filter(|p| p.0[0] > 0).count() as u64;
        assert_eq!(total, foreground);
    }
}
