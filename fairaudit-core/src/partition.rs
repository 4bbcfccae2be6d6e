//! Group partitions over a protected attribute.
//!
//! A [`GroupPartition`] names the protected attribute and the value that marks
//! each side. Assigning a dataset against it classifies every record into
//! exactly one group; a record that matches neither value is rejected rather
//! than silently left out of the metrics.

use crate::dataset::Dataset;
use crate::error::FairnessError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Privileged,
    Unprivileged,
}

impl Group {
    pub const BOTH: [Group; 2] = [Group::Privileged, Group::Unprivileged];

    fn index(self) -> usize {
        match self {
            Self::Privileged => 0,
            Self::Unprivileged => 1,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Privileged => f.write_str("privileged"),
            Self::Unprivileged => f.write_str("unprivileged"),
        }
    }
}

/// Binary outcome of a record's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Favorable,
    Unfavorable,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Favorable => f.write_str("favorable"),
            Self::Unfavorable => f.write_str("unfavorable"),
        }
    }
}

/// Privileged/unprivileged definitions over a single protected attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPartition {
    attribute: String,
    privileged: f64,
    unprivileged: f64,
}

impl GroupPartition {
    pub fn new(
        attribute: impl Into<String>,
        privileged: f64,
        unprivileged: f64,
    ) -> Result<Self, FairnessError> {
        let attribute = attribute.into();
        if attribute.trim().is_empty() {
            return Err(FairnessError::invalid_input(
                "partition attribute name must not be empty",
            ));
        }
        if !privileged.is_finite() || !unprivileged.is_finite() {
            return Err(FairnessError::invalid_input(
                "partition group values must be finite",
            ));
        }
        if privileged == unprivileged {
            return Err(FairnessError::invalid_input(format!(
                "privileged and unprivileged groups of '{attribute}' overlap (both {privileged})"
            )));
        }
        Ok(Self {
            attribute,
            privileged,
            unprivileged,
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn privileged_value(&self) -> f64 {
        self.privileged
    }

    pub fn unprivileged_value(&self) -> f64 {
        self.unprivileged
    }

    /// The same partition with the roles of the two groups exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            attribute: self.attribute.clone(),
            privileged: self.unprivileged,
            unprivileged: self.privileged,
        }
    }

    pub fn group_of(&self, value: f64) -> Option<Group> {
        if value == self.privileged {
            Some(Group::Privileged)
        } else if value == self.unprivileged {
            Some(Group::Unprivileged)
        } else {
            None
        }
    }

    /// Classify every record of `dataset` into one of the two groups.
    pub fn assign(&self, dataset: &Dataset) -> Result<GroupAssignment, FairnessError> {
        let column = dataset.protected_attribute(&self.attribute).ok_or_else(|| {
            FairnessError::invalid_input(format!(
                "dataset has no protected attribute '{}' (available: {})",
                self.attribute,
                dataset.protected_attribute_names().join(", ")
            ))
        })?;

        let mut groups = Vec::with_capacity(column.len());
        let mut counts = [0usize; 2];
        for (index, &value) in column.iter().enumerate() {
            let group = self.group_of(value).ok_or_else(|| {
                FairnessError::invalid_input(format!(
                    "record {index} has {} = {value}, which is neither privileged ({}) nor unprivileged ({})",
                    self.attribute, self.privileged, self.unprivileged
                ))
            })?;
            counts[group.index()] += 1;
            groups.push(group);
        }
        Ok(GroupAssignment { groups, counts })
    }
}

/// Per-record group membership produced by [`GroupPartition::assign`].
#[derive(Debug, Clone)]
pub struct GroupAssignment {
    groups: Vec<Group>,
    counts: [usize; 2],
}

impl GroupAssignment {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, index: usize) -> Group {
        self.groups[index]
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn count(&self, group: Group) -> usize {
        self.counts[group.index()]
    }

    /// Fails with `EmptyGroup` when either side has no records.
    pub fn require_both(&self) -> Result<(), FairnessError> {
        for group in Group::BOTH {
            if self.count(group) == 0 {
                return Err(FairnessError::empty_group(group));
            }
        }
        Ok(())
    }
}
