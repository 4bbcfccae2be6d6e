//! Error types for the fairaudit-core crate.

use crate::partition::Group;
use std::fmt;
use thiserror::Error;

/// Failures raised by the metric engine, the reweighing transform and the classifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FairnessError {
    #[error("Division by zero: {metric} is undefined because the {group} favorable rate is 0")]
    DivisionByZero { metric: &'static str, group: Group },

    #[error("Empty group: no weighted records in the {group} group")]
    EmptyGroup { group: Group },

    #[error("Fit failure: {0}")]
    FitFailure(String),

    #[error("Metric undefined: {metric} ({reason})")]
    MetricUndefined {
        metric: &'static str,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FairnessError {
    pub fn fit_failure(msg: impl Into<String>) -> Self {
        Self::FitFailure(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn undefined(metric: &'static str, reason: impl Into<String>) -> Self {
        Self::MetricUndefined {
            metric,
            reason: reason.into(),
        }
    }

    pub fn empty_group(group: Group) -> Self {
        Self::EmptyGroup { group }
    }
}

/// The fixed steps of an audit run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStep {
    MeasureOriginal,
    Reweigh,
    Standardize,
    Fit,
    Predict,
    MeasureMitigated,
}

impl AuditStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeasureOriginal => "measure original bias",
            Self::Reweigh => "reweigh",
            Self::Standardize => "standardize features",
            Self::Fit => "fit classifier",
            Self::Predict => "predict",
            Self::MeasureMitigated => "measure mitigated bias",
        }
    }
}

impl fmt::Display for AuditStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for audit runs and their surrounding IO.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit step '{step}' failed: {source}")]
    Step {
        step: AuditStep,
        #[source]
        source: FairnessError,
    },

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error(transparent)]
    Fairness(#[from] FairnessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AuditError {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report(msg.into())
    }

    /// The step that failed, when the error came from inside the pipeline.
    pub fn step(&self) -> Option<AuditStep> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl From<Box<figment::Error>> for AuditError {
    fn from(err: Box<figment::Error>) -> Self {
        Self::Config(err.to_string())
    }
}

/// Attaches the failing step to a pipeline result.
pub(crate) trait StepContext<T> {
    fn at_step(self, step: AuditStep) -> Result<T, AuditError>;
}

impl<T> StepContext<T> for Result<T, FairnessError> {
    fn at_step(self, step: AuditStep) -> Result<T, AuditError> {
        self.map_err(|source| AuditError::Step { step, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_group_message_names_group() {
        assert_eq!(
            FairnessError::empty_group(Group::Privileged).to_string(),
            "Empty group: no weighted records in the privileged group"
        );
    }

    #[test]
    fn test_step_context_identifies_step() {
        let res: Result<(), FairnessError> = Err(FairnessError::fit_failure("singular"));
        let err = res.at_step(AuditStep::Fit).unwrap_err();
        assert_eq!(err.step(), Some(AuditStep::Fit));
        assert!(err.to_string().contains("fit classifier"));
    }
}
