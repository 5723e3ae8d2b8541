//! Plain-text count summary.

use std::fmt::Write;

use cellcount_pipeline::AreaStats;

/// Render `stats` as a short human-readable block.
///
/// ```text
/// count:   12
/// mean:    431.5 px
/// min:     210 px
/// max:     655 px
/// std dev: 97.2 px
/// ```
///
/// With nothing kept only the count line is emitted.
#[must_use]
pub fn to_summary(stats: &AreaStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "count:   {}", stats.count);
    if stats.count == 0 {
        return out;
    }
    let _ = writeln!(out, "mean:    {:.1} px", stats.mean);
    let _ = writeln!(out, "min:     {} px", stats.min);
    let _ = writeln!(out, "max:     {} px", stats.max);
    let _ = writeln!(out, "std dev: {:.1} px", stats.std_dev);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_print_only_count() {
        assert_eq!(to_summary(&AreaStats::default()), "count:   0\n");
    }

    #[test]
    fn populated_stats_print_all_fields() {
        let stats = AreaStats {
            count: 3,
            mean: 200.0,
            min: 100,
            max: 300,
            std_dev: 81.649_658,
        };
        let text = to_summary(&stats);
        assert!(text.contains("count:   3"));
        assert!(text.contains("mean:    200.0 px"));
        assert!(text.contains("min:     100 px"));
        assert!(text.contains("max:     300 px"));
        assert!(text.contains("std dev: 81.6 px"));
    }
}
