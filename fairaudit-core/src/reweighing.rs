//! Reweighing pre-processing (Kamiran & Calders).
//!
//! Each (group, outcome) cell gets the factor `W(g) * W(o) / (W * W(g, o))`,
//! where `W(..)` are sums of the input instance weights. Multiplying every
//! record's weight by its cell factor makes group membership and outcome
//! independent under the new weights, so the weighted favorable rate is the
//! same in both groups.
//!
//! A cell with no weight gets the factor 1.0. When a group carries a single
//! outcome its own rate cannot move, and only the other group is pulled to
//! the pooled favorable rate.

use crate::dataset::Dataset;
use crate::error::FairnessError;
use crate::partition::{Group, GroupPartition, Outcome};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Unfitted reweighing transform bound to a partition.
#[derive(Debug, Clone)]
pub struct Reweighing {
    partition: GroupPartition,
}

/// Cell factors learned by [`Reweighing::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReweighingWeights {
    pub privileged_favorable: f64,
    pub privileged_unfavorable: f64,
    pub unprivileged_favorable: f64,
    pub unprivileged_unfavorable: f64,
}

impl Reweighing {
    pub fn new(partition: GroupPartition) -> Self {
        Self { partition }
    }

    pub fn partition(&self) -> &GroupPartition {
        &self.partition
    }

    pub fn fit(&self, dataset: &Dataset) -> Result<ReweighingWeights, FairnessError> {
        let assignment = self.partition.assign(dataset)?;
        assignment.require_both()?;

        // [group][outcome] weighted cell totals
        let mut cells = [[0.0f64; 2]; 2];
        for i in 0..dataset.len() {
            let g = group_index(assignment.group(i));
            let o = outcome_index(dataset.outcome(i));
            cells[g][o] += dataset.instance_weights()[i];
        }

        for group in Group::BOTH {
            let g = group_index(group);
            if cells[g][0] + cells[g][1] <= 0.0 {
                return Err(FairnessError::empty_group(group));
            }
        }

        let total: f64 = cells.iter().flatten().sum();
        let group_total = |g: usize| cells[g][0] + cells[g][1];
        let outcome_total = |o: usize| cells[0][o] + cells[1][o];
        // an empty cell scales no weight, so it stays neutral
        let factor = |g: usize, o: usize| {
            if cells[g][o] > 0.0 {
                group_total(g) * outcome_total(o) / (total * cells[g][o])
            } else {
                1.0
            }
        };

        let weights = ReweighingWeights {
            privileged_favorable: factor(0, 0),
            privileged_unfavorable: factor(0, 1),
            unprivileged_favorable: factor(1, 0),
            unprivileged_unfavorable: factor(1, 1),
        };
        debug!(?weights, total_weight = total, "Fitted reweighing factors");
        Ok(weights)
    }

    pub fn fit_transform(&self, dataset: &Dataset) -> Result<Dataset, FairnessError> {
        let weights = self.fit(dataset)?;
        weights.transform(dataset, &self.partition)
    }
}

impl ReweighingWeights {
    pub fn factor(&self, group: Group, outcome: Outcome) -> f64 {
        match (group, outcome) {
            (Group::Privileged, Outcome::Favorable) => self.privileged_favorable,
            (Group::Privileged, Outcome::Unfavorable) => self.privileged_unfavorable,
            (Group::Unprivileged, Outcome::Favorable) => self.unprivileged_favorable,
            (Group::Unprivileged, Outcome::Unfavorable) => self.unprivileged_unfavorable,
        }
    }

    /// Scale each record's instance weight by the factor of its cell.
    pub fn transform(
        &self,
        dataset: &Dataset,
        partition: &GroupPartition,
    ) -> Result<Dataset, FairnessError> {
        let assignment = partition.assign(dataset)?;
        let weights = (0..dataset.len())
            .map(|i| {
                dataset.instance_weights()[i] * self.factor(assignment.group(i), dataset.outcome(i))
            })
            .collect();
        dataset.with_instance_weights(weights)
    }
}

fn group_index(group: Group) -> usize {
    match group {
        Group::Privileged => 0,
        Group::Unprivileged => 1,
    }
}

fn outcome_index(outcome: Outcome) -> usize {
    match outcome {
        Outcome::Favorable => 0,
        Outcome::Unfavorable => 1,
    }
}
