//! Grouped bar chart of the metrics table.

use crate::error::AuditError;
use crate::report::ReportSink;
use crate::table::MetricsTable;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_CHART_FILE: &str = "compas_fairness_metrics.png";
pub const DEFAULT_TITLE: &str = "Fairness Metrics Before and After Mitigation";
const CHART_SIZE: (u32, u32) = (800, 600);

/// Renders the table as a PNG, or SVG when the path ends in `.svg`.
#[derive(Debug, Clone)]
pub struct BarChartSink {
    path: PathBuf,
    title: String,
}

impl BarChartSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            title: DEFAULT_TITLE.to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn is_svg(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
    }
}

impl ReportSink for BarChartSink {
    fn render(&mut self, table: &MetricsTable) -> Result<(), AuditError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        if self.is_svg() {
            let root = SVGBackend::new(&self.path, CHART_SIZE).into_drawing_area();
            draw(root, table, &self.title)?;
        } else {
            let root = BitMapBackend::new(&self.path, CHART_SIZE).into_drawing_area();
            draw(root, table, &self.title)?;
        }
        info!(path = %self.path.display(), "Wrote metrics chart");
        Ok(())
    }
}

fn chart_error(err: impl std::fmt::Display) -> AuditError {
    AuditError::report(format!("chart rendering failed: {err}"))
}

/// Y range covering every value and zero, padded so bars do not touch the frame.
pub(crate) fn value_range(table: &MetricsTable) -> Range<f64> {
    let (lo, hi) = table
        .rows()
        .iter()
        .flat_map(|r| r.values.iter().map(|v| v.value))
        .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((hi - lo) * 0.1).max(0.05);
    let bottom = if lo < 0.0 { lo - pad } else { 0.0 };
    bottom..hi + pad
}

fn draw<DB>(root: DrawingArea<DB, Shift>, table: &MetricsTable, title: &str) -> Result<(), AuditError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(chart_error)?;

    let rows = table.rows();
    let columns = table.columns();
    let labels: Vec<&str> = table.row_labels();
    let n = rows.len();
    let bar_width = 0.8 / columns.len().max(1) as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), value_range(table))
        .map_err(chart_error)?;

    let label_at = |x: &f64| {
        let i = x.round();
        if (x - i).abs() < 1e-6 && i >= 0.0 {
            labels.get(i as usize).copied().unwrap_or("").to_string()
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&label_at)
        .y_desc("Metric Value")
        .draw()
        .map_err(chart_error)?;

    for (j, column) in columns.iter().enumerate() {
        let color = Palette99::pick(j).mix(0.9);
        chart
            .draw_series(rows.iter().enumerate().map(|(i, row)| {
                let value = row.values.get(j).map_or(0.0, |v| v.value);
                let left = i as f64 - 0.4 + j as f64 * bar_width;
                Rectangle::new([(left, 0.0), (left + bar_width, value)], color.filled())
            }))
            .map_err(chart_error)?
            .label(*column)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_error)?;
    root.present().map_err(chart_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_range_includes_zero_and_negatives() {
        let range = value_range(&MetricsTable::new(0.5, 0.9, -0.2));
        assert!(range.start < -0.2);
        assert!(range.end > 0.9);

        let range = value_range(&MetricsTable::new(0.5, 1.1, 0.0));
        assert_eq!(range.start, 0.0);
        assert!(range.end > 1.1);
    }

    #[test]
    fn test_renders_png_and_svg() {
        let dir = tempfile::tempdir().unwrap();
        let table = MetricsTable::new(0.5, 0.95, -0.05);
        for file in ["nested/chart.png", "chart.svg"] {
            let mut sink = BarChartSink::new(dir.path().join(file)).with_title("Audit");
            sink.render(&table).unwrap();
            let written = std::fs::metadata(sink.path()).unwrap();
            assert!(written.len() > 0, "{file} is empty");
        }
        let svg = std::fs::read_to_string(dir.path().join("chart.svg")).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Audit"));
    }

    #[test]
    fn test_extension_selects_backend() {
        assert!(BarChartSink::new("out/chart.SVG").is_svg());
        assert!(!BarChartSink::new(DEFAULT_CHART_FILE).is_svg());
    }
}
