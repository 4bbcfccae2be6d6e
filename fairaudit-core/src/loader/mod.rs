//! Dataset loaders for the sources the audit can read.

pub mod compas;
pub mod tabular;

use crate::dataset::Dataset;
use crate::error::AuditError;
use crate::synthetic::SyntheticSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub use tabular::CsvSpec;

/// Where the audited dataset comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetSource {
    /// ProPublica `compas-scores-two-years.csv` with the standard filtering.
    Compas { path: PathBuf },
    /// Any numeric CSV with a binary label column.
    Csv(CsvSpec),
    /// Generated in memory.
    Synthetic(SyntheticSpec),
}

impl Default for DatasetSource {
    fn default() -> Self {
        Self::Compas {
            path: PathBuf::from(compas::DEFAULT_FILE_NAME),
        }
    }
}

impl DatasetSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Compas { path } => format!("compas:{}", path.display()),
            Self::Csv(spec) => format!("csv:{}", spec.path.display()),
            Self::Synthetic(spec) => format!("synthetic:seed={}", spec.seed),
        }
    }
}

pub fn load_dataset(source: &DatasetSource) -> Result<Dataset, AuditError> {
    let dataset = match source {
        DatasetSource::Compas { path } => compas::load(path)?,
        DatasetSource::Csv(spec) => tabular::load(spec)?,
        DatasetSource::Synthetic(spec) => spec
            .generate()
            .map_err(|e| AuditError::dataset(e.to_string()))?,
    };
    info!(
        source = %source.describe(),
        records = dataset.len(),
        features = dataset.num_features(),
        "Loaded dataset"
    );
    Ok(dataset)
}
