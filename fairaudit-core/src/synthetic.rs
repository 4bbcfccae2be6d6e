//! Seeded synthetic datasets with a known amount of label bias.

use crate::dataset::{Dataset, ProtectedAttribute};
use crate::error::{AuditError, FairnessError};
use crate::partition::GroupPartition;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const GROUP_ATTRIBUTE: &str = "group";
pub const LABEL_COLUMN: &str = "label";
pub const WEIGHT_COLUMN: &str = "instance_weight";

/// Group sizes, favorable rates and noise for a generated dataset.
///
/// Records are laid out privileged first, favorable before unfavorable within
/// each group. Favorable label is 1.0, the privileged group has `group = 1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSpec {
    pub privileged: usize,
    pub unprivileged: usize,
    pub privileged_favorable_rate: f64,
    pub unprivileged_favorable_rate: f64,
    /// Half-width of the uniform noise added to the `signal` feature.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            privileged: 50,
            unprivileged: 50,
            privileged_favorable_rate: 0.8,
            unprivileged_favorable_rate: 0.4,
            noise: 0.25,
            seed: 0,
        }
    }
}

impl SyntheticSpec {
    /// Partition matching the generated `group` attribute.
    pub fn partition() -> Result<GroupPartition, FairnessError> {
        GroupPartition::new(GROUP_ATTRIBUTE, 1.0, 0.0)
    }

    pub fn generate(&self) -> Result<Dataset, FairnessError> {
        for rate in [self.privileged_favorable_rate, self.unprivileged_favorable_rate] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(FairnessError::invalid_input(format!(
                    "favorable rate {rate} is outside [0, 1]"
                )));
            }
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(FairnessError::invalid_input("noise must be finite and non-negative"));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut features = Vec::new();
        let mut labels = Vec::new();
        let mut groups = Vec::new();
        for (group, size, rate) in [
            (1.0, self.privileged, self.privileged_favorable_rate),
            (0.0, self.unprivileged, self.unprivileged_favorable_rate),
        ] {
            let favorable = (rate * size as f64).round() as usize;
            for i in 0..size {
                let is_favorable = i < favorable;
                let base = if is_favorable { 1.0 } else { -1.0 };
                let signal = base + rng.gen_range(-self.noise..=self.noise);
                let nuisance = rng.gen_range(-1.0..=1.0);
                features.push(vec![group, signal, nuisance]);
                labels.push(if is_favorable { 1.0 } else { 0.0 });
                groups.push(group);
            }
        }

        Dataset::from_rows(
            vec![GROUP_ATTRIBUTE.into(), "signal".into(), "nuisance".into()],
            features,
            labels,
            vec![ProtectedAttribute::new(GROUP_ATTRIBUTE, groups)],
            1.0,
            0.0,
        )
    }
}

/// Write `dataset` as CSV: features, protected attributes not already among
/// the features, then `label` and `instance_weight`.
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<(), AuditError> {
    let mut writer = csv::Writer::from_path(path)?;
    let extra: Vec<&ProtectedAttribute> = dataset
        .protected_attributes()
        .iter()
        .filter(|a| !dataset.feature_names().contains(&a.name))
        .collect();

    let mut header: Vec<&str> = dataset.feature_names().iter().map(String::as_str).collect();
    header.extend(extra.iter().map(|a| a.name.as_str()));
    header.push(LABEL_COLUMN);
    header.push(WEIGHT_COLUMN);
    writer.write_record(&header)?;

    for i in 0..dataset.len() {
        let mut record: Vec<String> = dataset
            .features()
            .row(i)
            .iter()
            .map(f64::to_string)
            .collect();
        record.extend(extra.iter().map(|a| a.values[i].to_string()));
        record.push(dataset.labels()[i].to_string());
        record.push(dataset.instance_weights()[i].to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
