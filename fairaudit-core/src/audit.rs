//! The audit driver: measure, reweigh, refit, re-measure.
//!
//! Steps run once each, in a fixed order, and the first failure aborts the
//! run with [`AuditError::Step`] naming the step:
//!
//! 1. disparate impact of the raw labels,
//! 2. reweighing on the same partition,
//! 3. feature standardization,
//! 4. classifier fit on the reweighed data (weights passed when supported),
//! 5. prediction and construction of the predicted dataset,
//! 6. disparate impact and FPR difference of predictions against the reweighed truth.

use crate::classifier::Classifier;
use crate::dataset::{Dataset, DatasetSummary};
use crate::error::{AuditError, AuditStep, StepContext};
use crate::metrics::{BinaryLabelMetric, ClassificationMetric};
use crate::partition::GroupPartition;
use crate::preprocessing::StandardScaler;
use crate::reweighing::{Reweighing, ReweighingWeights};
use crate::table::MetricsTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};
use uuid::Uuid;

/// Bias of the dataset's own labels before mitigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalMetrics {
    pub disparate_impact: f64,
    pub statistical_parity_difference: f64,
}

/// Bias of the refitted classifier's predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigatedMetrics {
    pub disparate_impact: f64,
    pub false_positive_rate_difference: f64,
    pub statistical_parity_difference: f64,
    pub equal_opportunity_difference: f64,
    pub average_odds_difference: f64,
    pub accuracy: f64,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub seed: Option<u64>,
    pub classifier: String,
    pub dataset: DatasetSummary,
    pub partition: GroupPartition,
    pub reweighing: ReweighingWeights,
    pub original: OriginalMetrics,
    pub mitigated: MitigatedMetrics,
    pub table: MetricsTable,
}

/// Audit bound to a partition and a classifier.
pub struct FairnessAudit<C> {
    partition: GroupPartition,
    classifier: C,
    seed: Option<u64>,
}

impl<C: Classifier> FairnessAudit<C> {
    pub fn new(partition: GroupPartition, classifier: C) -> Self {
        Self {
            partition,
            classifier,
            seed: None,
        }
    }

    /// Record the seed the classifier was configured with, for the report.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn partition(&self) -> &GroupPartition {
        &self.partition
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn run(&mut self, dataset: &Dataset) -> Result<AuditReport, AuditError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("audit", %run_id, attribute = self.partition.attribute());
        let _enter = span.enter();

        let summary = dataset.summary();
        info!(
            records = summary.num_records,
            features = summary.num_features,
            protected = ?summary.protected_attributes,
            favorable_label = summary.favorable_label,
            unfavorable_label = summary.unfavorable_label,
            "Auditing dataset"
        );

        let original_metric =
            BinaryLabelMetric::new(dataset, &self.partition).at_step(AuditStep::MeasureOriginal)?;
        let original = OriginalMetrics {
            disparate_impact: original_metric
                .disparate_impact()
                .at_step(AuditStep::MeasureOriginal)?,
            statistical_parity_difference: original_metric
                .statistical_parity_difference()
                .at_step(AuditStep::MeasureOriginal)?,
        };
        info!(disparate_impact = original.disparate_impact, "Original bias measured");

        let reweighing = Reweighing::new(self.partition.clone());
        let factors = reweighing.fit(dataset).at_step(AuditStep::Reweigh)?;
        let weighted = factors
            .transform(dataset, &self.partition)
            .at_step(AuditStep::Reweigh)?;
        info!(?factors, "Reweighed dataset");

        let (_, features) =
            StandardScaler::fit_transform(weighted.features()).at_step(AuditStep::Standardize)?;

        let weights = self
            .classifier
            .supports_sample_weight()
            .then(|| weighted.instance_weights());
        self.classifier
            .fit(features.view(), weighted.labels(), weights)
            .at_step(AuditStep::Fit)?;
        info!(
            classifier = self.classifier.name(),
            weighted = weights.is_some(),
            "Classifier fitted"
        );

        let predictions = self
            .classifier
            .predict(features.view())
            .at_step(AuditStep::Predict)?;
        let predicted = weighted
            .with_labels(predictions.to_vec())
            .at_step(AuditStep::Predict)?;

        let classified = ClassificationMetric::new(&weighted, &predicted, &self.partition)
            .at_step(AuditStep::MeasureMitigated)?;
        let mitigated = MitigatedMetrics {
            disparate_impact: classified
                .disparate_impact()
                .at_step(AuditStep::MeasureMitigated)?,
            false_positive_rate_difference: classified
                .false_positive_rate_difference()
                .at_step(AuditStep::MeasureMitigated)?,
            statistical_parity_difference: classified
                .statistical_parity_difference()
                .at_step(AuditStep::MeasureMitigated)?,
            equal_opportunity_difference: classified
                .equal_opportunity_difference()
                .at_step(AuditStep::MeasureMitigated)?,
            average_odds_difference: classified
                .average_odds_difference()
                .at_step(AuditStep::MeasureMitigated)?,
            accuracy: classified.accuracy().at_step(AuditStep::MeasureMitigated)?,
        };
        info!(
            disparate_impact = mitigated.disparate_impact,
            fpr_difference = mitigated.false_positive_rate_difference,
            accuracy = mitigated.accuracy,
            "Mitigated bias measured"
        );

        let table = MetricsTable::new(
            original.disparate_impact,
            mitigated.disparate_impact,
            mitigated.false_positive_rate_difference,
        );

        Ok(AuditReport {
            run_id,
            generated_at: Utc::now(),
            seed: self.seed,
            classifier: self.classifier.name().to_string(),
            dataset: summary,
            partition: self.partition.clone(),
            reweighing: factors,
            original,
            mitigated,
            table,
        })
    }
}
