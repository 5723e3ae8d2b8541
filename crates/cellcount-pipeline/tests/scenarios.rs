//! Integration tests: synthetic microscopy frames through both counting paths.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use cellcount_pipeline::{
    BACKGROUND, BOUNDARY, Dimensions, DirectConfig, DynamicImage, GrayImage, Point, UNKNOWN,
    WatershedConfig, direct_segment, roi, watershed_count,
};
use image::Luma;
use imageproc::drawing::draw_filled_circle_mut;

const OBJECT: Luma<u8> = Luma([200]);

/// Black frame with filled disks at the given `(x, y, radius)`.
fn disks(width: u32, height: u32, circles: &[(i32, i32, i32)]) -> DynamicImage {
    let mut canvas = GrayImage::new(width, height);
    for &(x, y, r) in circles {
        draw_filled_circle_mut(&mut canvas, (x, y), r, OBJECT);
    }
    DynamicImage::ImageLuma8(canvas)
}

fn touching_pair() -> DynamicImage {
    disks(200, 200, &[(90, 100, 15), (110, 100, 15)])
}

/// Small (~150 px) and large (~3000 px) disks far apart.
fn small_and_large() -> DynamicImage {
    disks(200, 200, &[(30, 30, 7), (130, 130, 31)])
}

#[test]
fn single_circle_counts_one() {
    let result = watershed_count(&disks(200, 200, &[(100, 100, 15)]), &WatershedConfig::default())
        .expect("watershed should succeed");
    assert_eq!(result.count, 1);
    assert_eq!(result.kept.len(), 1);
    assert_eq!(result.stats.count, 1);

    let region = result.kept[0];
    assert_eq!(region.id, 1);
    assert!((98.0..=102.0).contains(&region.centroid.x), "{:?}", region.centroid);
    assert!((98.0..=102.0).contains(&region.centroid.y), "{:?}", region.centroid);
    assert!((450..=800).contains(&region.area), "area {}", region.area);
}

#[test]
fn touching_circles_split_only_with_watershed() {
    let image = touching_pair();

    let watershed = watershed_count(&image, &WatershedConfig::default()).unwrap();
    assert_eq!(watershed.count, 2);
    assert!(watershed.kept[0].centroid.x < 100.0);
    assert!(watershed.kept[1].centroid.x > 100.0);

    let direct = direct_segment(&image, &DirectConfig::default()).unwrap();
    assert_eq!(direct.components.len(), 1);
    assert_eq!(direct.stats.count, 1);
}

#[test]
fn supplementation_rescues_seedless_blob() {
    let image = disks(200, 200, &[(100, 100, 15)]);
    let config = WatershedConfig {
        peak_thresh_frac: 1.0,
        seed_supplement: true,
        ..WatershedConfig::default()
    };

    let with = watershed_count(&image, &config).unwrap();
    assert_eq!(with.count, 1);

    let without = watershed_count(
        &image,
        &WatershedConfig {
            seed_supplement: false,
            ..config
        },
    )
    .unwrap();
    assert_eq!(without.count, 0);
    assert!(without.kept.is_empty());
}

#[test]
fn area_bounds_reject_small_and_large_disks() {
    let image = small_and_large();

    let direct = direct_segment(
        &image,
        &DirectConfig {
            min_area: 200,
            max_area: 2000,
            ..DirectConfig::default()
        },
    )
    .unwrap();
    assert!(direct.components.is_empty());

    let watershed = watershed_count(
        &image,
        &WatershedConfig {
            min_area: 200,
            max_area: 2000,
            ..WatershedConfig::default()
        },
    )
    .unwrap();
    assert_eq!(watershed.count, 0);
}

#[test]
fn area_bounds_admit_exactly_one_disk() {
    let image = small_and_large();

    let small = direct_segment(
        &image,
        &DirectConfig {
            min_area: 100,
            max_area: 2000,
            ..DirectConfig::default()
        },
    )
    .unwrap();
    assert_eq!(small.components.len(), 1);
    assert!(small.components[0].centroid.x < 50.0);

    let large = direct_segment(
        &image,
        &DirectConfig {
            min_area: 200,
            max_area: 5000,
            ..DirectConfig::default()
        },
    )
    .unwrap();
    assert_eq!(large.components.len(), 1);
    assert!(large.components[0].centroid.x > 100.0);

    let small = watershed_count(
        &image,
        &WatershedConfig {
            min_area: 50,
            max_area: 2000,
            ..WatershedConfig::default()
        },
    )
    .unwrap();
    assert_eq!(small.count, 1);
    assert!(small.kept[0].centroid.x < 50.0);

    let large = watershed_count(
        &image,
        &WatershedConfig {
            min_area: 1000,
            max_area: 5000,
            ..WatershedConfig::default()
        },
    )
    .unwrap();
    assert_eq!(large.count, 1);
    assert!(large.kept[0].centroid.x > 100.0);
}

#[test]
fn labels_partition_the_image() {
    let result = watershed_count(&touching_pair(), &WatershedConfig::default()).unwrap();
    let labels = &result.debug.labels;
    let total = labels.iter().count();
    let count = |keep: fn(i32) -> bool| labels.iter().filter(|&&l| keep(l)).count();

    let background = count(|l| l == BACKGROUND);
    let boundary = count(|l| l == BOUNDARY);
    let objects = count(|l| l > BACKGROUND);
    let unknown = count(|l| l == UNKNOWN);

    assert_eq!(unknown, 0);
    assert_eq!(background + boundary + objects, total);
}

#[test]
fn foreground_is_never_left_unlabelled() {
    for image in [touching_pair(), small_and_large(), disks(60, 60, &[(30, 30, 20)])] {
        let result = watershed_count(&image, &WatershedConfig::default()).unwrap();
        let labels = &result.debug.labels;
        for (x, y, pixel) in result.debug.binary.enumerate_pixels() {
            if pixel.0[0] > 0 {
                let label = labels.get_pixel(x, y).0[0];
                assert!(label > BACKGROUND || label == BOUNDARY, "({x}, {y}) = {label}");
            }
        }
    }
}

#[test]
fn repeated_runs_are_identical() {
    let image = disks(120, 90, &[(30, 40, 12), (48, 40, 12), (90, 60, 9)]);
    let config = WatershedConfig::default();
    let first = watershed_count(&image, &config).unwrap();
    let second = watershed_count(&image, &config).unwrap();
    assert_eq!(first.debug.labels, second.debug.labels);
    assert_eq!(first.kept, second.kept);
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.overlay, second.overlay);

    let direct = DirectConfig::default();
    assert_eq!(
        direct_segment(&image, &direct).unwrap().components,
        direct_segment(&image, &direct).unwrap().components,
    );
}

#[test]
fn empty_frame_counts_zero() {
    let image = DynamicImage::ImageLuma8(GrayImage::new(64, 48));
    let watershed = watershed_count(&image, &WatershedConfig::default()).unwrap();
    assert_eq!(watershed.count, 0);
    assert!(watershed.kept.is_empty());
    assert_eq!(watershed.stats.count, 0);
    assert!(watershed.stats.mean.abs() < f64::EPSILON);

    let direct = direct_segment(&image, &DirectConfig::default()).unwrap();
    assert!(direct.components.is_empty());
    assert_eq!(direct.stats.count, 0);
}

#[test]
fn region_of_interest_excludes_outside_cells() {
    let image = disks(200, 200, &[(50, 50, 15), (150, 150, 15)]);
    let start = [Point::new(0.0, 0.0), Point::new(199.0, 0.0)];
    let stop = [Point::new(0.0, 100.0), Point::new(199.0, 100.0)];
    let polygon = roi::polygon_from_curves(&start, &stop);
    let mask = roi::polygon_mask(Dimensions { width: 200, height: 200 }, &polygon).unwrap();
    let masked = roi::apply_mask(&image, &mask).unwrap();

    let everything = watershed_count(&image, &WatershedConfig::default()).unwrap();
    assert_eq!(everything.count, 2);

    let inside = watershed_count(&masked, &WatershedConfig::default()).unwrap();
    assert_eq!(inside.count, 1);
    assert!(inside.kept[0].centroid.y < 100.0);
}
