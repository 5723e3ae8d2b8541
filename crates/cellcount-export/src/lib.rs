//! cellcount-export: Pure format serializers (sans-IO)
//!
//! Converts counting results into output formats: a CSV component table,
//! PNG-encoded overlays, and a plain-text summary. Every function returns
//! bytes or a `String`; writing files is the caller's job.

pub mod csv;
pub mod png;
pub mod summary;

pub use csv::{CSV_HEADER, to_csv};
pub use png::{encode_gray_png, encode_rgb_png};
pub use summary::to_summary;

/// Errors from the export serializers.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The PNG encoder rejected the image.
    #[error("failed to encode PNG: {0}")]
    Png(#[from] image::ImageError),

    /// The image has no pixels.
    #[error("cannot encode an empty {width}x{height} image")]
    EmptyImage {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
}
