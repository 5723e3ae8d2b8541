//! Marker-controlled watershed.
//!
//! Markers come from the seed mask: each 8-connected seed blob becomes one
//! region id (shifted by one so that [`BACKGROUND`] is free). The mask is
//! dilated to bound the area the flood may claim; everything inside that
//! bound which is not a seed starts as [`UNKNOWN`], everything outside is
//! [`BACKGROUND`].
//!
//! The flood uses a priority queue keyed by the absolute intensity
//! difference between a pixel and the labeled neighbour that enqueued it.
//! Equal priorities are served in enqueue order. A popped pixel whose
//! labeled 4-neighbours disagree becomes [`BOUNDARY`] and stops there.
//!
//! Foreground pixels of the mask are claimed by regions only: background
//! never enqueues them and is ignored when they are labeled, so a mask
//! pixel ends as a region id or [`BOUNDARY`]. Background competes with
//! regions for the dilated band outside the mask.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;

use crate::label::{self, Connectivity, LabelGrid};

/// Pixel between two regions.
pub const BOUNDARY: i32 = -1;
/// Not yet assigned.
pub const UNKNOWN: i32 = 0;
/// Known background.
pub const BACKGROUND: i32 = 1;

/// Neighbour scan order: up, left, right, down.
const NEIGHBOURS: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// Watershed output.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Final labels: [`BOUNDARY`], [`BACKGROUND`] or a region id ≥ 2.
    pub labels: LabelGrid,
    /// Number of markers the flood started from (excluding background).
    pub markers: u32,
}

/// Initial marker grid for the flood.
///
/// Returns the grid and the number of seed markers.
#[must_use]
pub fn build_markers(seeds: &GrayImage, mask: &GrayImage, dilate_iters: u8) -> (LabelGrid, u32) {
    let seed_labels = label::label_components(seeds, Connectivity::Eight);
    let bound = if dilate_iters == 0 {
        mask.clone()
    } else {
        imageproc::morphology::dilate(mask, Norm::L1, dilate_iters)
    };

    let markers = LabelGrid::from_fn(mask.width(), mask.height(), |x, y| {
        let seed = seed_labels.labels.get_pixel(x, y).0[0];
        if seed > 0 {
            Luma([seed + 1])
        } else if bound.get_pixel(x, y).0[0] != 0 {
            Luma([UNKNOWN])
        } else {
            Luma([BACKGROUND])
        }
    });
    (markers, seed_labels.count)
}

/// Run the marker-controlled watershed over `surface`.
#[must_use = "returns the label grid"]
pub fn segment(surface: &GrayImage, seeds: &GrayImage, mask: &GrayImage, dilate_iters: u8) -> Segmentation {
    let (mut labels, markers) = build_markers(seeds, mask, dilate_iters);
    flood(surface, mask, &mut labels);
    tracing::debug!(markers, "watershed flood complete");
    Segmentation { labels, markers }
}

#[derive(Debug)]
struct Queue {
    heap: BinaryHeap<Reverse<(u8, u64, usize)>>,
    seq: u64,
}

impl Queue {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    fn push(&mut self, priority: u8, index: usize) {
        self.heap.push(Reverse((priority, self.seq, index)));
        self.seq += 1;
    }

    fn pop(&mut self) -> Option<usize> {
        self.heap.pop().map(|Reverse((_, _, index))| index)
    }
}

fn neighbour(x: u32, y: u32, (dx, dy): (i64, i64), width: u32, height: u32) -> Option<(u32, u32)> {
    let nx = u32::try_from(i64::from(x) + dx).ok()?;
    let ny = u32::try_from(i64::from(y) + dy).ok()?;
    (nx < width && ny < height).then_some((nx, ny))
}

const fn is_region(label: i32) -> bool {
    label > BACKGROUND
}

/// Flood every [`UNKNOWN`] pixel reachable from a labeled one.
///
/// Nonzero pixels of `mask` only take region ids (or [`BOUNDARY`]);
/// [`BACKGROUND`] spreads through the band outside it. Pixels the flood
/// never reaches become [`BACKGROUND`].
pub fn flood(surface: &GrayImage, mask: &GrayImage, labels: &mut LabelGrid) {
    let (width, height) = labels.dimensions();
    let level = |x: u32, y: u32| surface.get_pixel(x, y).0[0];
    let in_mask = |x: u32, y: u32| mask.get_pixel(x, y).0[0] != 0;
    // Which neighbour labels may claim the pixel at (x, y).
    let claims = |x: u32, y: u32, other: i32| {
        if in_mask(x, y) { is_region(other) } else { other > UNKNOWN }
    };
    let index = |x: u32, y: u32| y as usize * width as usize + x as usize;

    let mut queued = vec![false; width as usize * height as usize];
    let mut queue = Queue::new();

    for y in 0..height {
        for x in 0..width {
            if labels.get_pixel(x, y).0[0] != UNKNOWN {
                continue;
            }
            let here = level(x, y);
            let priority = NEIGHBOURS
                .iter()
                .filter_map(|&d| neighbour(x, y, d, width, height))
                .filter(|&(nx, ny)| claims(x, y, labels.get_pixel(nx, ny).0[0]))
                .map(|(nx, ny)| here.abs_diff(level(nx, ny)))
                .min();
            if let Some(priority) = priority {
                let i = index(x, y);
                queued[i] = true;
                queue.push(priority, i);
            }
        }
    }

    while let Some(i) = queue.pop() {
        let (x, y) = coords(i, width);
        let mut label = UNKNOWN;
        for &d in &NEIGHBOURS {
            let Some((nx, ny)) = neighbour(x, y, d, width, height) else {
                continue;
            };
            let other = labels.get_pixel(nx, ny).0[0];
            if !claims(x, y, other) {
                continue;
            }
            if label == UNKNOWN {
                label = other;
            } else if label != other {
                label = BOUNDARY;
            }
        }
        labels.put_pixel(x, y, Luma([label]));
        if label == BOUNDARY || label == UNKNOWN {
            continue;
        }

        let here = level(x, y);
        for &d in &NEIGHBOURS {
            let Some((nx, ny)) = neighbour(x, y, d, width, height) else {
                continue;
            };
            let j = index(nx, ny);
            if labels.get_pixel(nx, ny).0[0] == UNKNOWN && !queued[j] && claims(nx, ny, label) {
                queued[j] = true;
                queue.push(here.abs_diff(level(nx, ny)), j);
            }
        }
    }

    for v in labels.iter_mut() {
        if *v == UNKNOWN {
            *v = BACKGROUND;
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn coords(index: usize, width: u32) -> (u32, u32) {
    let w = width as usize;
    ((index % w) as u32, (index / w) as u32)
}
