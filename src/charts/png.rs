use crate::charts::{drawable_series, ChartRenderer};
use crate::models::ResourceKind;
use crate::output::format_number;
use crate::storage::ResourceSeries;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 600;
const MAX_DATE_LABELS: usize = 10;
const FONT_FAMILY: &str = "sans-serif";
const FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// Line chart rasterized to a PNG file
#[derive(Debug, Clone, Default)]
pub struct PngChartRenderer;

impl PngChartRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ChartRenderer for PngChartRenderer {
    fn render(
        &self,
        kind: ResourceKind,
        series: &ResourceSeries,
        output_path: &Path,
    ) -> Result<bool> {
        let lines = drawable_series(series);
        if lines.is_empty() {
            return Ok(false);
        }

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create chart directory: {}", parent.display())
                })?;
            }
        }
        ensure_font()?;

        let dates: Vec<NaiveDate> = lines
            .iter()
            .flat_map(|(_, points)| points.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let max_count = lines
            .iter()
            .flat_map(|(_, points)| points.values().copied())
            .max()
            .unwrap_or(0);
        let y_max = (max_count + max_count / 10).max(1);
        let x_max = dates.len().saturating_sub(1).max(1);
        let index_of = |date: &NaiveDate| dates.binary_search(date).unwrap_or(0);

        let root = BitMapBackend::new(output_path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(kind.chart_title(), (FONT_FAMILY, 26))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(90)
            .build_cartesian_2d(0usize..x_max, 0u64..y_max)
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .x_labels(dates.len().min(MAX_DATE_LABELS))
            .x_label_formatter(&|index| date_label(&dates, *index))
            .y_label_formatter(&|count| format_number(*count))
            .x_desc("Date")
            .y_desc("Requests")
            .label_style((FONT_FAMILY, 14))
            .draw()
            .map_err(chart_error)?;

        for (slot, (name, points)) in lines.iter().enumerate() {
            let color = PALETTE[slot % PALETTE.len()];
            let coords: Vec<(usize, u64)> = points
                .iter()
                .map(|(date, count)| (index_of(date), *count))
                .collect();

            chart
                .draw_series(LineSeries::new(coords.clone(), color.stroke_width(2)))
                .map_err(chart_error)?
                .label(name.as_str())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart
                .draw_series(
                    coords
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
                )
                .map_err(chart_error)?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font((FONT_FAMILY, 14))
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .draw()
            .map_err(chart_error)?;

        root.present().map_err(|e| {
            anyhow!("Failed to write chart {}: {e}", output_path.display())
        })?;

        info!(path = %output_path.display(), "Trend chart saved");
        Ok(true)
    }

    fn file_extension(&self) -> &'static str {
        "png"
    }
}

/// Axis label for the `index`-th distinct date
fn date_label(dates: &[NaiveDate], index: usize) -> String {
    dates
        .get(index)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Text is drawn with the bundled font; it is registered once per process.
fn ensure_font() -> Result<()> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT)
                .map_err(|_| "Failed to load chart font".to_string())
        })
        .clone()
        .map_err(|message| anyhow!(message))
}

fn chart_error<E: std::fmt::Display>(error: E) -> anyhow::Error {
    anyhow!("Failed to draw chart: {error}")
}
