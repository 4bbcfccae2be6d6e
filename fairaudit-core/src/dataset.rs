//! Binary-label dataset with protected attributes and instance weights.

use crate::error::FairnessError;
use crate::partition::Outcome;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A named protected-attribute column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedAttribute {
    pub name: String,
    pub values: Vec<f64>,
}

impl ProtectedAttribute {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Ordered records, each with a feature vector, one binary label, protected
/// attribute values and an instance weight.
///
/// The label encoding (`favorable_label` / `unfavorable_label`) is fixed at
/// construction. Derived datasets are produced through [`Dataset::with_labels`]
/// and [`Dataset::with_instance_weights`], never by mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Array2<f64>,
    labels: Vec<f64>,
    protected_attributes: Vec<ProtectedAttribute>,
    instance_weights: Vec<f64>,
    favorable_label: f64,
    unfavorable_label: f64,
}

impl Dataset {
    /// Build a dataset with unit instance weights from a `records x features` matrix.
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        labels: Vec<f64>,
        protected_attributes: Vec<ProtectedAttribute>,
        favorable_label: f64,
        unfavorable_label: f64,
    ) -> Result<Self, FairnessError> {
        let weights = vec![1.0; labels.len()];
        let dataset = Self {
            feature_names,
            features,
            labels,
            protected_attributes,
            instance_weights: weights,
            favorable_label,
            unfavorable_label,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Like [`Dataset::new`], from one feature vector per record.
    pub fn from_rows(
        feature_names: Vec<String>,
        rows: Vec<Vec<f64>>,
        labels: Vec<f64>,
        protected_attributes: Vec<ProtectedAttribute>,
        favorable_label: f64,
        unfavorable_label: f64,
    ) -> Result<Self, FairnessError> {
        let width = feature_names.len();
        if let Some(i) = rows.iter().position(|row| row.len() != width) {
            return Err(FairnessError::invalid_input(format!(
                "record {i} has {} features, expected {width}",
                rows[i].len()
            )));
        }
        let shape = (rows.len(), width);
        let features = Array2::from_shape_vec(shape, rows.into_iter().flatten().collect())
            .map_err(|e| FairnessError::invalid_input(e.to_string()))?;
        Self::new(
            feature_names,
            features,
            labels,
            protected_attributes,
            favorable_label,
            unfavorable_label,
        )
    }

    fn validate(&self) -> Result<(), FairnessError> {
        let n = self.labels.len();
        if n == 0 {
            return Err(FairnessError::invalid_input("dataset has no records"));
        }
        if !self.favorable_label.is_finite() || !self.unfavorable_label.is_finite() {
            return Err(FairnessError::invalid_input("label constants must be finite"));
        }
        if self.favorable_label == self.unfavorable_label {
            return Err(FairnessError::invalid_input(format!(
                "favorable and unfavorable labels are both {}",
                self.favorable_label
            )));
        }
        if self.features.nrows() != n {
            return Err(FairnessError::invalid_input(format!(
                "{} feature rows for {n} labels",
                self.features.nrows()
            )));
        }
        let width = self.feature_names.len();
        if self.features.ncols() != width {
            return Err(FairnessError::invalid_input(format!(
                "{} feature columns for {width} feature names",
                self.features.ncols()
            )));
        }
        for (i, row) in self.features.rows().into_iter().enumerate() {
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(FairnessError::invalid_input(format!(
                    "record {i} has a non-finite value for feature '{}'",
                    self.feature_names[j]
                )));
            }
        }
        for (i, &label) in self.labels.iter().enumerate() {
            if label != self.favorable_label && label != self.unfavorable_label {
                return Err(FairnessError::invalid_input(format!(
                    "record {i} has label {label}, expected {} or {}",
                    self.favorable_label, self.unfavorable_label
                )));
            }
        }
        for attr in &self.protected_attributes {
            if attr.values.len() != n {
                return Err(FairnessError::invalid_input(format!(
                    "protected attribute '{}' has {} values for {n} records",
                    attr.name,
                    attr.values.len()
                )));
            }
        }
        if self.instance_weights.len() != n {
            return Err(FairnessError::invalid_input(format!(
                "{} instance weights for {n} records",
                self.instance_weights.len()
            )));
        }
        if let Some(i) = self
            .instance_weights
            .iter()
            .position(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(FairnessError::invalid_input(format!(
                "record {i} has invalid instance weight {}",
                self.instance_weights[i]
            )));
        }
        Ok(())
    }

    /// A copy of this dataset carrying `weights` instead of the current ones.
    pub fn with_instance_weights(&self, weights: Vec<f64>) -> Result<Self, FairnessError> {
        let dataset = Self {
            instance_weights: weights,
            ..self.clone()
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// A copy of this dataset with labels replaced, e.g. by classifier predictions.
    pub fn with_labels(&self, labels: Vec<f64>) -> Result<Self, FairnessError> {
        let dataset = Self {
            labels,
            ..self.clone()
        };
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn instance_weights(&self) -> &[f64] {
        &self.instance_weights
    }

    pub fn favorable_label(&self) -> f64 {
        self.favorable_label
    }

    pub fn unfavorable_label(&self) -> f64 {
        self.unfavorable_label
    }

    pub fn protected_attributes(&self) -> &[ProtectedAttribute] {
        &self.protected_attributes
    }

    pub fn protected_attribute_names(&self) -> Vec<&str> {
        self.protected_attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn protected_attribute(&self, name: &str) -> Option<&[f64]> {
        self.protected_attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.values.as_slice())
    }

    pub fn outcome(&self, index: usize) -> Outcome {
        if self.labels[index] == self.favorable_label {
            Outcome::Favorable
        } else {
            Outcome::Unfavorable
        }
    }

    pub fn is_favorable(&self, index: usize) -> bool {
        self.outcome(index) == Outcome::Favorable
    }

    pub fn total_weight(&self) -> f64 {
        self.instance_weights.iter().sum()
    }

    /// SHA-256 over names, values, labels, weights and label constants.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.feature_names {
            hasher.update(name.as_bytes());
            hasher.update(b"\x1f");
        }
        for v in &self.features {
            hasher.update(v.to_le_bytes());
        }
        for v in &self.labels {
            hasher.update(v.to_le_bytes());
        }
        for attr in &self.protected_attributes {
            hasher.update(attr.name.as_bytes());
            hasher.update(b"\x1f");
            for v in &attr.values {
                hasher.update(v.to_le_bytes());
            }
        }
        for w in &self.instance_weights {
            hasher.update(w.to_le_bytes());
        }
        hasher.update(self.favorable_label.to_le_bytes());
        hasher.update(self.unfavorable_label.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            num_records: self.len(),
            num_features: self.num_features(),
            protected_attributes: self
                .protected_attributes
                .iter()
                .map(|a| a.name.clone())
                .collect(),
            favorable_label: self.favorable_label,
            unfavorable_label: self.unfavorable_label,
            favorable_count: (0..self.len()).filter(|&i| self.is_favorable(i)).count(),
            total_weight: self.total_weight(),
            fingerprint: self.fingerprint(),
        }
    }
}

/// Shape and identity of a dataset, for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub num_records: usize,
    pub num_features: usize,
    pub protected_attributes: Vec<String>,
    pub favorable_label: f64,
    pub unfavorable_label: f64,
    pub favorable_count: usize,
    pub total_weight: f64,
    pub fingerprint: String,
}
