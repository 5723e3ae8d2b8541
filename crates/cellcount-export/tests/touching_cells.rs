//! Integration test: count a synthetic frame and export every artifact.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use cellcount_pipeline::{DirectConfig, DynamicImage, GrayImage, WatershedConfig};
use image::Luma;
use imageproc::drawing::draw_filled_circle_mut;

fn frame() -> DynamicImage {
    let mut canvas = GrayImage::new(160, 120);
    for (x, y) in [(50, 60), (70, 60), (125, 30)] {
        draw_filled_circle_mut(&mut canvas, (x, y), 15, Luma([220]));
    }
    DynamicImage::ImageLuma8(canvas)
}

#[test]
fn watershed_result_exports_to_csv_and_png() {
    let result = cellcount_pipeline::watershed_count(&frame(), &WatershedConfig::default())
        .expect("pipeline should succeed");
    assert_eq!(result.count, 3);

    let csv = cellcount_export::to_csv(&result.kept);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Label,Area,X-Cord,Y-Cord,Height,Width");
    assert_eq!(lines.len(), result.count + 1);
    for (line, record) in lines[1..].iter().zip(&result.kept) {
        assert!(line.starts_with(&format!("{},{},", record.id, record.area)));
    }

    let png = cellcount_export::encode_rgb_png(&result.overlay).unwrap();
    let decoded = image::load_from_memory(&png).unwrap().into_rgb8();
    assert_eq!(decoded, result.overlay);

    let summary = cellcount_export::to_summary(&result.stats);
    assert!(summary.starts_with("count:   3\n"));
}

#[test]
fn direct_result_exports_merged_pair() {
    let config = DirectConfig {
        max_area: 5000,
        ..DirectConfig::default()
    };
    let result = cellcount_pipeline::direct_segment(&frame(), &config).unwrap();
    assert_eq!(result.components.len(), 2);

    let csv = cellcount_export::to_csv(&result.components);
    assert_eq!(csv.lines().count(), 3);

    let png = cellcount_export::encode_gray_png(&result.overlay).unwrap();
    let decoded = image::load_from_memory(&png).unwrap().into_luma8();
    assert_eq!(decoded, result.overlay);
}
