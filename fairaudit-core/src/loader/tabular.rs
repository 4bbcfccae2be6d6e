//! Generic numeric CSV loader.

use crate::dataset::{Dataset, ProtectedAttribute};
use crate::error::AuditError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Column mapping for a numeric CSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSpec {
    pub path: PathBuf,
    pub label_column: String,
    pub favorable_label: f64,
    pub unfavorable_label: f64,
    pub protected_attributes: Vec<String>,
    /// Empty means every column other than the label and weight columns.
    #[serde(default)]
    pub feature_columns: Vec<String>,
    #[serde(default)]
    pub weight_column: Option<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, AuditError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| AuditError::dataset(format!("CSV has no column '{name}'")))
}

pub fn load(spec: &CsvSpec) -> Result<Dataset, AuditError> {
    if !spec.delimiter.is_ascii() {
        return Err(AuditError::dataset(format!(
            "delimiter '{}' is not a single-byte character",
            spec.delimiter
        )));
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(spec.delimiter as u8)
        .trim(csv::Trim::All)
        .from_path(&spec.path)?;
    let headers = reader.headers()?.clone();

    let label_idx = column_index(&headers, &spec.label_column)?;
    let weight_idx = spec
        .weight_column
        .as_deref()
        .map(|name| column_index(&headers, name))
        .transpose()?;
    let protected_idx = spec
        .protected_attributes
        .iter()
        .map(|name| column_index(&headers, name))
        .collect::<Result<Vec<_>, _>>()?;
    let feature_names: Vec<String> = if spec.feature_columns.is_empty() {
        headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != label_idx && Some(*i) != weight_idx)
            .map(|(_, h)| h.to_string())
            .collect()
    } else {
        spec.feature_columns.clone()
    };
    let feature_idx = feature_names
        .iter()
        .map(|name| column_index(&headers, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut weights = Vec::new();
    let mut protected = vec![Vec::new(); protected_idx.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |idx: usize| -> Result<f64, AuditError> {
            let raw = record.get(idx).unwrap_or("");
            raw.parse::<f64>().map_err(|_| {
                AuditError::dataset(format!(
                    "row {}: column '{}' has non-numeric value '{raw}'",
                    row + 1,
                    &headers[idx]
                ))
            })
        };
        features.push(
            feature_idx
                .iter()
                .map(|&i| cell(i))
                .collect::<Result<Vec<_>, _>>()?,
        );
        labels.push(cell(label_idx)?);
        if let Some(i) = weight_idx {
            weights.push(cell(i)?);
        }
        for (values, &i) in protected.iter_mut().zip(&protected_idx) {
            values.push(cell(i)?);
        }
    }

    let protected_attributes = spec
        .protected_attributes
        .iter()
        .zip(protected)
        .map(|(name, values)| ProtectedAttribute::new(name.clone(), values))
        .collect();
    let dataset = Dataset::from_rows(
        feature_names,
        features,
        labels,
        protected_attributes,
        spec.favorable_label,
        spec.unfavorable_label,
    )
    .map_err(|e| AuditError::dataset(format!("{}: {e}", spec.path.display())))?;

    if weight_idx.is_some() {
        dataset
            .with_instance_weights(weights)
            .map_err(|e| AuditError::dataset(format!("{}: {e}", spec.path.display())))
    } else {
        Ok(dataset)
    }
}
