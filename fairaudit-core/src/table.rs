//! The before/after metrics table handed to report sinks.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

pub const ORIGINAL_ROW: &str = "Original";
pub const MITIGATED_ROW: &str = "After Mitigation";
pub const DISPARATE_IMPACT_COLUMN: &str = "Disparate Impact";
pub const FPR_DIFFERENCE_COLUMN: &str = "FPR Difference";

/// A named value within a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
}

/// One labelled row; values keep column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub label: String,
    pub values: Vec<MetricValue>,
}

impl MetricsRow {
    fn new(label: &str, disparate_impact: f64, fpr_difference: f64) -> Self {
        Self {
            label: label.to_string(),
            values: vec![
                MetricValue {
                    name: DISPARATE_IMPACT_COLUMN.to_string(),
                    value: disparate_impact,
                },
                MetricValue {
                    name: FPR_DIFFERENCE_COLUMN.to_string(),
                    value: fpr_difference,
                },
            ],
        }
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.iter().find(|v| v.name == column).map(|v| v.value)
    }
}

/// Exactly two rows (`Original`, `After Mitigation`) by two columns
/// (`Disparate Impact`, `FPR Difference`). Deserialization rejects any other shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct MetricsTable {
    rows: Vec<MetricsRow>,
}

#[derive(Deserialize)]
struct RawTable {
    rows: Vec<MetricsRow>,
}

impl TryFrom<RawTable> for MetricsTable {
    type Error = String;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        let labels: Vec<&str> = raw.rows.iter().map(|r| r.label.as_str()).collect();
        if labels != [ORIGINAL_ROW, MITIGATED_ROW] {
            return Err(format!(
                "metrics table rows must be [\"{ORIGINAL_ROW}\", \"{MITIGATED_ROW}\"], got {labels:?}"
            ));
        }
        for row in &raw.rows {
            let columns: Vec<&str> = row.values.iter().map(|v| v.name.as_str()).collect();
            if columns != [DISPARATE_IMPACT_COLUMN, FPR_DIFFERENCE_COLUMN] {
                return Err(format!(
                    "row '{}' must have columns [\"{DISPARATE_IMPACT_COLUMN}\", \"{FPR_DIFFERENCE_COLUMN}\"], got {columns:?}",
                    row.label
                ));
            }
        }
        Ok(Self { rows: raw.rows })
    }
}

impl MetricsTable {
    /// The original row's FPR difference is 0: no predictions exist before mitigation.
    pub fn new(
        original_disparate_impact: f64,
        mitigated_disparate_impact: f64,
        mitigated_fpr_difference: f64,
    ) -> Self {
        Self {
            rows: vec![
                MetricsRow::new(ORIGINAL_ROW, original_disparate_impact, 0.0),
                MetricsRow::new(
                    MITIGATED_ROW,
                    mitigated_disparate_impact,
                    mitigated_fpr_difference,
                ),
            ],
        }
    }

    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    pub fn row_labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    pub fn columns(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|r| r.values.iter().map(|v| v.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn row(&self, label: &str) -> Option<&MetricsRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    pub fn value(&self, row: &str, column: &str) -> Option<f64> {
        self.row(row)?.value(column)
    }

    /// Aligned plain-text rendering.
    pub fn render_text(&self) -> String {
        let columns = self.columns();
        let label_width = self
            .rows
            .iter()
            .map(|r| r.label.len())
            .max()
            .unwrap_or(0);
        let widths: Vec<usize> = columns.iter().map(|c| c.len().max(8)).collect();

        let mut out = String::new();
        let _ = write!(out, "{:label_width$}", "");
        for (name, width) in columns.iter().zip(&widths) {
            let _ = write!(out, "  {name:>width$}");
        }
        out.push('\n');
        for row in &self.rows {
            let _ = write!(out, "{:label_width$}", row.label);
            for (value, width) in row.values.iter().zip(&widths) {
                let _ = write!(out, "  {:>width$.4}", value.value);
            }
            out.push('\n');
        }
        out
    }
}
