//! CSV export of the kept component table.
//!
//! One header line followed by one row per component:
//!
//! ```text
//! Label,Area,X-Cord,Y-Cord,Height,Width
//! 1,412,18,40,23,22
//! ```
//!
//! `X-Cord`/`Y-Cord` are the top-left corner of the bounding box. Lines
//! end with `\n`.

use std::fmt::Write;

use cellcount_pipeline::ComponentRecord;

/// Column names, in output order.
pub const CSV_HEADER: [&str; 6] = ["Label", "Area", "X-Cord", "Y-Cord", "Height", "Width"];

/// Serialize `components` into a CSV string.
///
/// An empty slice produces only the header line.
///
/// # Examples
///
/// ```
/// use cellcount_pipeline::{BoundingBox, ComponentRecord, Point};
///
/// let record = ComponentRecord {
///     id: 1,
///     area: 9,
///     bbox: BoundingBox { x: 2, y: 3, height: 3, width: 3 },
///     centroid: Point::new(3.0, 4.0),
/// };
/// let csv = cellcount_export::to_csv(&[record]);
/// assert_eq!(csv, "Label,Area,X-Cord,Y-Cord,Height,Width\n1,9,2,3,3,3\n");
/// ```
#[must_use]
pub fn to_csv(components: &[ComponentRecord]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');
    for c in components {
        // Writing to a String is infallible.
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            c.id, c.area, c.bbox.x, c.bbox.y, c.bbox.height, c.bbox.width
        );
    }
    out
}
