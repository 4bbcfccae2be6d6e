//! # fairaudit-core: Demographic Bias Audit with Reweighing Mitigation
//!
//! Measures how a binary-labelled dataset treats a privileged and an
//! unprivileged group, reweighs the records to remove label bias, fits a
//! logistic regression on the reweighed data and measures the predictions
//! again. The result is a two-row table:
//!
//! | | Disparate Impact | FPR Difference |
//! |---|---|---|
//! | Original | DI of the labels | 0.0 |
//! | After Mitigation | DI of the predictions | FPR(unpriv) - FPR(priv) |
//!
//! ```no_run
//! use fairaudit_core::{FairnessAudit, GroupPartition, LogisticRegression, LogisticRegressionConfig};
//! use fairaudit_core::loader::{DatasetSource, load_dataset};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = load_dataset(&DatasetSource::default())?;
//! let partition = GroupPartition::new("race", 0.0, 1.0)?;
//! let classifier = LogisticRegression::new(LogisticRegressionConfig::default(), 42);
//! let report = FairnessAudit::new(partition, classifier).with_seed(42).run(&dataset)?;
//! print!("{}", report.table.render_text());
//! # Ok(())
//! # }
//! ```

// Foundation
pub mod config;
pub mod error;

// Data
pub mod dataset;
pub mod loader;
pub mod partition;
pub mod synthetic;

// Measurement & mitigation
pub mod classifier;
pub mod metrics;
pub mod preprocessing;
pub mod reweighing;

// Driver & output
pub mod audit;
pub mod chart;
pub mod report;
pub mod table;

// Re-exports
pub use audit::{AuditReport, FairnessAudit, MitigatedMetrics, OriginalMetrics};
pub use chart::BarChartSink;
pub use classifier::{Classifier, LogisticRegression, LogisticRegressionConfig, Solver};
pub use config::{AuditConfig, ConfigOverrides, load_config};
pub use dataset::{Dataset, DatasetSummary, ProtectedAttribute};
pub use error::{AuditError, AuditStep, FairnessError};
pub use metrics::{BinaryLabelMetric, ClassificationMetric};
pub use partition::{Group, GroupPartition, Outcome};
pub use preprocessing::StandardScaler;
pub use report::{ReportSink, TextSink, write_json_report};
pub use reweighing::{Reweighing, ReweighingWeights};
pub use table::MetricsTable;
