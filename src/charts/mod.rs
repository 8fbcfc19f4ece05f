// Trend chart rendering
pub mod png;

use crate::models::ResourceKind;
use crate::storage::ResourceSeries;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;

pub use png::PngChartRenderer;

/// Resources with fewer points than this are left off a chart
pub const MIN_POINTS_PER_LINE: usize = 2;

/// Draws per-resource request series to an image file
pub trait ChartRenderer: Send + Sync {
    /// Write a chart for `series` to `output_path`. Returns `false` without
    /// touching the file when no resource has enough points to draw.
    fn render(
        &self,
        kind: ResourceKind,
        series: &ResourceSeries,
        output_path: &Path,
    ) -> Result<bool>;

    fn file_extension(&self) -> &'static str;
}

/// Resources that can be drawn as a line, in name order
pub fn drawable_series(series: &ResourceSeries) -> Vec<(&String, &BTreeMap<NaiveDate, u64>)> {
    series
        .iter()
        .filter(|(_, points)| points.len() >= MIN_POINTS_PER_LINE)
        .collect()
}

/// Whether a chart for this kind would show at least one line
pub fn has_drawable_series(series: &ResourceSeries) -> bool {
    series.values().any(|points| points.len() >= MIN_POINTS_PER_LINE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drawable_series_filters_short_lines() {
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let mut series = ResourceSeries::new();
        series.insert("long".to_string(), BTreeMap::from([(d1, 1), (d2, 2)]));
        series.insert("short".to_string(), BTreeMap::from([(d2, 2)]));

        let drawable = drawable_series(&series);
        assert_eq!(drawable.len(), 1);
        assert_eq!(drawable[0].0, "long");
        assert!(has_drawable_series(&series));

        series.remove("long");
        assert!(!has_drawable_series(&series));
    }
}
