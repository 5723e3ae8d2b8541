//! Overlay images for the two segmentation paths.
//!
//! The watershed overlay is the normalized image in RGB with each kept
//! region's display number written at its centroid. Digits come from a
//! built-in 3×5 bitmap font drawn with
//! [`imageproc::drawing::draw_filled_rect_mut`]; the number's bottom-left
//! corner sits at `(floor(cx), floor(cy))`. The direct overlay is the union
//! of kept components as a binary mask.

use std::collections::BTreeSet;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::label::LabelGrid;
use crate::threshold::FOREGROUND;
use crate::types::ComponentRecord;

/// Color of the region numbers.
pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Size in pixels of one glyph cell.
pub const GLYPH_SCALE: u32 = 2;

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;

/// Rows of each digit, top to bottom, most significant bit leftmost.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Normalized image with kept regions numbered by their record id.
///
/// Records with zero area are skipped.
#[must_use = "returns the overlay image"]
#[allow(clippy::cast_possible_truncation)]
pub fn numbered_overlay(normalized: &GrayImage, kept: &[ComponentRecord]) -> RgbImage {
    let mut canvas = RgbImage::from_fn(normalized.width(), normalized.height(), |x, y| {
        let v = normalized.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });
    for record in kept.iter().filter(|r| r.area > 0) {
        let x = record.centroid.x.floor() as i32;
        let y = record.centroid.y.floor() as i32;
        draw_number(&mut canvas, record.id, x, y, LABEL_COLOR);
    }
    canvas
}

/// Draw `number` with its bottom-left corner at `(x, y)`.
///
/// Parts falling outside the canvas are clipped.
#[allow(clippy::cast_possible_wrap)]
pub fn draw_number(canvas: &mut RgbImage, number: u32, x: i32, y: i32, color: Rgb<u8>) {
    let advance = ((GLYPH_WIDTH + 1) * GLYPH_SCALE) as i32;
    let top = y - (GLYPH_HEIGHT * GLYPH_SCALE) as i32 + 1;
    for (i, digit) in number.to_string().bytes().enumerate() {
        let Some(rows) = DIGITS.get(usize::from(digit - b'0')) else {
            continue;
        };
        let left = x + advance * i32::try_from(i).unwrap_or(0);
        draw_glyph(canvas, rows, left, top, color);
    }
}

#[allow(clippy::cast_possible_wrap)]
fn draw_glyph(canvas: &mut RgbImage, rows: &[u8; 5], left: i32, top: i32, color: Rgb<u8>) {
    let cell = GLYPH_SCALE as i32;
    for (row, bits) in (0i32..).zip(rows) {
        for col in 0..GLYPH_WIDTH as i32 {
            if bits & (0b100 >> col) == 0 {
                continue;
            }
            let rect = Rect::at(left + col * cell, top + row * cell).of_size(GLYPH_SCALE, GLYPH_SCALE);
            draw_filled_rect_mut(canvas, rect, color);
        }
    }
}

/// Binary image of every pixel whose label belongs to a kept record.
#[must_use = "returns the overlay mask"]
pub fn union_overlay(labels: &LabelGrid, kept: &[ComponentRecord]) -> GrayImage {
    let ids: BTreeSet<i32> = kept
        .iter()
        .filter_map(|r| i32::try_from(r.id).ok())
        .collect();
    GrayImage::from_fn(labels.width(), labels.height(), |x, y| {
        if ids.contains(&labels.get_pixel(x, y).0[0]) {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}
