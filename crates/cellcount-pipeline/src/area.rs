//! Size filtering of measured regions and summary statistics.

use crate::types::{AreaStats, ComponentRecord};

/// Inclusive area range a region must fall in to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaFilter {
    pub min_area: u64,
    pub max_area: u64,
}

impl AreaFilter {
    #[must_use]
    pub const fn new(min_area: u64, max_area: u64) -> Self {
        Self { min_area, max_area }
    }

    /// Whether `area` is within `[min_area, max_area]`.
    #[must_use]
    pub const fn admits(&self, area: u64) -> bool {
        self.min_area <= area && area <= self.max_area
    }

    /// Keep the records whose area is admitted, preserving order.
    #[must_use]
    pub fn apply(&self, records: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
        records.into_iter().filter(|r| self.admits(r.area)).collect()
    }
}

/// Rewrite record ids as display numbers `1..=n` in their current order.
#[must_use]
pub fn renumber(records: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
    records
        .into_iter()
        .zip(1u32..)
        .map(|(record, id)| ComponentRecord { id, ..record })
        .collect()
}

/// Count, mean, min, max and population standard deviation of the areas.
///
/// Returns all zeros for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn stats(records: &[ComponentRecord]) -> AreaStats {
    if records.is_empty() {
        return AreaStats::default();
    }
    let n = records.len() as f64;
    let mean = records.iter().map(|r| r.area as f64).sum::<f64>() / n;
    let variance = records
        .iter()
        .map(|r| {
            let d = r.area as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    AreaStats {
        count: records.len(),
        mean,
        min: records.iter().map(|r| r.area).min().unwrap_or(0),
        max: records.iter().map(|r| r.area).max().unwrap_or(0),
        std_dev: variance.sqrt(),
    }
}
