//! Group fairness metrics over instance-weighted binary-label datasets.
//!
//! Counts are sums of instance weights, so a freshly loaded dataset (unit
//! weights) reduces to plain record counts and a reweighed dataset reports
//! weighted rates. Undefined quantities are errors, never `NaN`:
//!
//! - a group with no records is `EmptyGroup`,
//! - a zero privileged favorable rate in a ratio is `DivisionByZero`,
//! - any other zero denominator is `MetricUndefined`.

use crate::dataset::Dataset;
use crate::error::FairnessError;
use crate::partition::{Group, GroupAssignment, GroupPartition};
use serde::{Deserialize, Serialize};

/// Weighted totals for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupCounts {
    pub records: usize,
    pub weight: f64,
    pub favorable_weight: f64,
}

fn group_counts(dataset: &Dataset, assignment: &GroupAssignment, group: Group) -> GroupCounts {
    let mut counts = GroupCounts::default();
    for i in 0..dataset.len() {
        if assignment.group(i) != group {
            continue;
        }
        let w = dataset.instance_weights()[i];
        counts.records += 1;
        counts.weight += w;
        if dataset.is_favorable(i) {
            counts.favorable_weight += w;
        }
    }
    counts
}

/// Dataset-level metrics that only look at labels.
#[derive(Debug, Clone)]
pub struct BinaryLabelMetric {
    privileged: GroupCounts,
    unprivileged: GroupCounts,
}

impl BinaryLabelMetric {
    pub fn new(dataset: &Dataset, partition: &GroupPartition) -> Result<Self, FairnessError> {
        let assignment = partition.assign(dataset)?;
        assignment.require_both()?;
        Ok(Self {
            privileged: group_counts(dataset, &assignment, Group::Privileged),
            unprivileged: group_counts(dataset, &assignment, Group::Unprivileged),
        })
    }

    pub fn counts(&self, group: Group) -> GroupCounts {
        match group {
            Group::Privileged => self.privileged,
            Group::Unprivileged => self.unprivileged,
        }
    }

    pub fn num_instances(&self, group: Group) -> f64 {
        self.counts(group).weight
    }

    /// Weighted fraction of favorable outcomes within `group`.
    pub fn base_rate(&self, group: Group) -> Result<f64, FairnessError> {
        let counts = self.counts(group);
        if counts.weight <= 0.0 {
            return Err(FairnessError::undefined(
                "base rate",
                format!("the {group} group has zero total weight"),
            ));
        }
        Ok(counts.favorable_weight / counts.weight)
    }

    /// Unprivileged base rate divided by privileged base rate.
    pub fn disparate_impact(&self) -> Result<f64, FairnessError> {
        ratio(
            "disparate impact",
            self.base_rate(Group::Unprivileged)?,
            self.base_rate(Group::Privileged)?,
        )
    }

    /// Unprivileged base rate minus privileged base rate.
    pub fn statistical_parity_difference(&self) -> Result<f64, FairnessError> {
        Ok(self.base_rate(Group::Unprivileged)? - self.base_rate(Group::Privileged)?)
    }
}

fn ratio(metric: &'static str, unprivileged: f64, privileged: f64) -> Result<f64, FairnessError> {
    if privileged == 0.0 {
        return Err(FairnessError::DivisionByZero {
            metric,
            group: Group::Privileged,
        });
    }
    Ok(unprivileged / privileged)
}

/// Weighted confusion matrix; "positive" means the favorable label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryConfusionMatrix {
    pub tp: f64,
    pub fp: f64,
    pub tn: f64,
    #[serde(rename = "fn")]
    pub fn_: f64,
}

impl BinaryConfusionMatrix {
    pub fn total(&self) -> f64 {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// Weight of records whose true label is unfavorable.
    pub fn actual_negatives(&self) -> f64 {
        self.fp + self.tn
    }

    pub fn actual_positives(&self) -> f64 {
        self.tp + self.fn_
    }

    fn record(&mut self, truth_favorable: bool, pred_favorable: bool, w: f64) {
        match (truth_favorable, pred_favorable) {
            (true, true) => self.tp += w,
            (true, false) => self.fn_ += w,
            (false, true) => self.fp += w,
            (false, false) => self.tn += w,
        }
    }
}

/// Metrics comparing a ground-truth dataset with a predicted copy of it.
#[derive(Debug, Clone)]
pub struct ClassificationMetric {
    predicted: BinaryLabelMetric,
    privileged: BinaryConfusionMatrix,
    unprivileged: BinaryConfusionMatrix,
}

impl ClassificationMetric {
    pub fn new(
        truth: &Dataset,
        predicted: &Dataset,
        partition: &GroupPartition,
    ) -> Result<Self, FairnessError> {
        check_compatible(truth, predicted)?;
        let assignment = partition.assign(truth)?;
        assignment.require_both()?;

        let mut privileged = BinaryConfusionMatrix::default();
        let mut unprivileged = BinaryConfusionMatrix::default();
        for i in 0..truth.len() {
            let w = truth.instance_weights()[i];
            let matrix = match assignment.group(i) {
                Group::Privileged => &mut privileged,
                Group::Unprivileged => &mut unprivileged,
            };
            matrix.record(truth.is_favorable(i), predicted.is_favorable(i), w);
        }

        Ok(Self {
            predicted: BinaryLabelMetric::new(predicted, partition)?,
            privileged,
            unprivileged,
        })
    }

    pub fn confusion_matrix(&self, group: Group) -> BinaryConfusionMatrix {
        match group {
            Group::Privileged => self.privileged,
            Group::Unprivileged => self.unprivileged,
        }
    }

    pub fn overall_confusion_matrix(&self) -> BinaryConfusionMatrix {
        let p = self.privileged;
        let u = self.unprivileged;
        BinaryConfusionMatrix {
            tp: p.tp + u.tp,
            fp: p.fp + u.fp,
            tn: p.tn + u.tn,
            fn_: p.fn_ + u.fn_,
        }
    }

    pub fn false_positive_rate(&self, group: Group) -> Result<f64, FairnessError> {
        let m = self.confusion_matrix(group);
        if m.actual_negatives() <= 0.0 {
            return Err(FairnessError::undefined(
                "false positive rate",
                format!("the {group} group has no actual negatives"),
            ));
        }
        Ok(m.fp / m.actual_negatives())
    }

    pub fn true_positive_rate(&self, group: Group) -> Result<f64, FairnessError> {
        let m = self.confusion_matrix(group);
        if m.actual_positives() <= 0.0 {
            return Err(FairnessError::undefined(
                "true positive rate",
                format!("the {group} group has no actual positives"),
            ));
        }
        Ok(m.tp / m.actual_positives())
    }

    /// FPR(unprivileged) - FPR(privileged).
    pub fn false_positive_rate_difference(&self) -> Result<f64, FairnessError> {
        Ok(self.false_positive_rate(Group::Unprivileged)?
            - self.false_positive_rate(Group::Privileged)?)
    }

    /// TPR(unprivileged) - TPR(privileged).
    pub fn equal_opportunity_difference(&self) -> Result<f64, FairnessError> {
        Ok(self.true_positive_rate(Group::Unprivileged)?
            - self.true_positive_rate(Group::Privileged)?)
    }

    /// Mean of the FPR and TPR differences.
    pub fn average_odds_difference(&self) -> Result<f64, FairnessError> {
        Ok(0.5 * (self.false_positive_rate_difference()? + self.equal_opportunity_difference()?))
    }

    /// Weighted fraction of records whose predicted label matches the truth.
    pub fn accuracy(&self) -> Result<f64, FairnessError> {
        let m = self.overall_confusion_matrix();
        if m.total() <= 0.0 {
            return Err(FairnessError::undefined("accuracy", "total weight is zero"));
        }
        Ok((m.tp + m.tn) / m.total())
    }

    /// Disparate impact of the predicted labels.
    pub fn disparate_impact(&self) -> Result<f64, FairnessError> {
        self.predicted.disparate_impact()
    }

    pub fn statistical_parity_difference(&self) -> Result<f64, FairnessError> {
        self.predicted.statistical_parity_difference()
    }
}

fn check_compatible(truth: &Dataset, predicted: &Dataset) -> Result<(), FairnessError> {
    if truth.len() != predicted.len() {
        return Err(FairnessError::invalid_input(format!(
            "truth has {} records but predictions have {}",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.favorable_label() != predicted.favorable_label()
        || truth.unfavorable_label() != predicted.unfavorable_label()
    {
        return Err(FairnessError::invalid_input(
            "truth and predictions use different label encodings",
        ));
    }
    if truth.instance_weights() != predicted.instance_weights() {
        return Err(FairnessError::invalid_input(
            "truth and predictions carry different instance weights",
        ));
    }
    if truth.protected_attributes() != predicted.protected_attributes() {
        return Err(FairnessError::invalid_input(
            "truth and predictions carry different protected attributes",
        ));
    }
    Ok(())
}

/// Disparate impact of `dataset`'s labels under `partition`.
pub fn disparate_impact(dataset: &Dataset, partition: &GroupPartition) -> Result<f64, FairnessError> {
    BinaryLabelMetric::new(dataset, partition)?.disparate_impact()
}

/// False-positive-rate difference of `predicted` against `truth`.
pub fn false_positive_rate_difference(
    truth: &Dataset,
    predicted: &Dataset,
    partition: &GroupPartition,
) -> Result<f64, FairnessError> {
    ClassificationMetric::new(truth, predicted, partition)?.false_positive_rate_difference()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ProtectedAttribute;

    /// Builds a dataset from (group value, label) pairs; favorable label is 1.
    fn build(records: &[(f64, f64)]) -> Dataset {
        Dataset::from_rows(
            vec!["x".into()],
            records.iter().map(|_| vec![0.0]).collect(),
            records.iter().map(|r| r.1).collect(),
            vec![ProtectedAttribute::new(
                "race",
                records.iter().map(|r| r.0).collect(),
            )],
            1.0,
            0.0,
        )
        .unwrap()
    }

    fn partition() -> GroupPartition {
        GroupPartition::new("race", 0.0, 1.0).unwrap()
    }

    #[test]
    fn test_disparate_impact_ratio() {
        // privileged: 4/5 favorable, unprivileged: 2/5 favorable
        let mut records = vec![(0.0, 1.0); 4];
        records.push((0.0, 0.0));
        records.extend(vec![(1.0, 1.0); 2]);
        records.extend(vec![(1.0, 0.0); 3]);
        let ds = build(&records);
        let di = disparate_impact(&ds, &partition()).unwrap();
        assert!((di - 0.5).abs() < 1e-12);
        let metric = BinaryLabelMetric::new(&ds, &partition()).unwrap();
        assert!((metric.statistical_parity_difference().unwrap() + 0.4).abs() < 1e-12);
        assert_eq!(metric.num_instances(Group::Unprivileged), 5.0);
    }

    #[test]
    fn test_parity_gives_one() {
        let ds = build(&[(0.0, 1.0), (0.0, 0.0), (1.0, 1.0), (1.0, 0.0)]);
        assert!((disparate_impact(&ds, &partition()).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_change_rates() {
        let ds = build(&[(0.0, 1.0), (0.0, 0.0), (1.0, 1.0), (1.0, 0.0)])
            .with_instance_weights(vec![3.0, 1.0, 1.0, 1.0])
            .unwrap();
        let di = disparate_impact(&ds, &partition()).unwrap();
        assert!((di - 0.5 / 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_privileged_rate_is_division_by_zero() {
        let ds = build(&[(0.0, 0.0), (0.0, 0.0), (1.0, 1.0)]);
        let err = disparate_impact(&ds, &partition()).unwrap_err();
        assert!(matches!(
            err,
            FairnessError::DivisionByZero {
                group: Group::Privileged,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_unprivileged_group() {
        let ds = build(&[(0.0, 1.0), (0.0, 0.0)]);
        let err = disparate_impact(&ds, &partition()).unwrap_err();
        assert_eq!(err, FairnessError::empty_group(Group::Unprivileged));
    }

    #[test]
    fn test_false_positive_rate_difference() {
        let truth = build(&[
            (0.0, 0.0),
            (0.0, 0.0),
            (0.0, 1.0),
            (1.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
        ]);
        // privileged: one of two negatives predicted favorable; unprivileged: none
        let predicted = truth
            .with_labels(vec![1.0, 0.0, 1.0, 0.0, 0.0, 0.0])
            .unwrap();
        let metric = ClassificationMetric::new(&truth, &predicted, &partition()).unwrap();
        assert!((metric.false_positive_rate(Group::Privileged).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(metric.false_positive_rate(Group::Unprivileged).unwrap(), 0.0);
        assert!((metric.false_positive_rate_difference().unwrap() + 0.5).abs() < 1e-12);
        assert!((metric.equal_opportunity_difference().unwrap() + 1.0).abs() < 1e-12);
        assert!((metric.average_odds_difference().unwrap() + 0.75).abs() < 1e-12);
        assert!((metric.accuracy().unwrap() - 4.0 / 6.0).abs() < 1e-12);
        let m = metric.confusion_matrix(Group::Privileged);
        assert_eq!((m.tp, m.fp, m.tn, m.fn_), (1.0, 1.0, 1.0, 0.0));
    }

    #[test]
    fn test_fpr_undefined_without_negatives() {
        let truth = build(&[(0.0, 1.0), (0.0, 0.0), (1.0, 1.0)]);
        let err = false_positive_rate_difference(&truth, &truth, &partition()).unwrap_err();
        assert!(matches!(err, FairnessError::MetricUndefined { .. }));
    }

    #[test]
    fn test_mismatched_weights_rejected() {
        let truth = build(&[(0.0, 1.0), (1.0, 0.0)]);
        let predicted = truth.with_instance_weights(vec![2.0, 1.0]).unwrap();
        assert!(ClassificationMetric::new(&truth, &predicted, &partition()).is_err());
    }

    #[test]
    fn test_predicted_disparate_impact_uses_predictions() {
        let truth = build(&[(0.0, 1.0), (0.0, 0.0), (1.0, 1.0), (1.0, 0.0)]);
        let predicted = truth.with_labels(vec![1.0, 1.0, 1.0, 0.0]).unwrap();
        let metric = ClassificationMetric::new(&truth, &predicted, &partition()).unwrap();
        assert!((metric.disparate_impact().unwrap() - 0.5).abs() < 1e-12);
    }
}
