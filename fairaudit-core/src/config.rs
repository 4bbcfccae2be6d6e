//! Configuration for audit runs.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace or explicit file -> environment -> CLI overrides.
//! The user file lives at `<config_dir>/fairaudit/config.toml`, the workspace
//! file at `<workspace>/fairaudit.toml`.

use crate::chart::DEFAULT_CHART_FILE;
use crate::classifier::LogisticRegressionConfig;
use crate::error::AuditError;
use crate::loader::DatasetSource;
use crate::partition::GroupPartition;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const WORKSPACE_CONFIG_FILE: &str = "fairaudit.toml";
pub const ENV_PREFIX: &str = "FAIRAUDIT_";

/// Top-level configuration for an audit run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Seed for the classifier. Deliberately has no default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub dataset: DatasetSource,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub classifier: LogisticRegressionConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Protected attribute and the values selecting each group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    #[serde(default = "default_attribute")]
    pub attribute: String,
    #[serde(default = "default_privileged")]
    pub privileged: f64,
    #[serde(default = "default_unprivileged")]
    pub unprivileged: f64,
}

fn default_attribute() -> String {
    "race".to_string()
}

fn default_privileged() -> f64 {
    0.0
}

fn default_unprivileged() -> f64 {
    1.0
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            attribute: default_attribute(),
            privileged: default_privileged(),
            unprivileged: default_unprivileged(),
        }
    }
}

/// Where results are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Render the bar chart.
    #[serde(default = "default_true")]
    pub chart: bool,
    #[serde(default = "default_chart_path")]
    pub chart_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_title: Option<String>,
    /// Full JSON report; skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_chart_path() -> PathBuf {
    PathBuf::from(DEFAULT_CHART_FILE)
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            chart: true,
            chart_path: default_chart_path(),
            chart_title: None,
            json_path: None,
        }
    }
}

impl AuditConfig {
    /// Check the settings that cannot be defaulted and return the partition.
    pub fn validate(&self) -> Result<GroupPartition, AuditError> {
        if self.seed.is_none() {
            return Err(AuditError::config(
                "no classifier seed configured; pass --seed or set FAIRAUDIT_SEED",
            ));
        }
        let c = self.classifier.c;
        if !(c.is_finite() && c > 0.0) {
            return Err(AuditError::config(format!(
                "classifier.c must be positive, got {c}"
            )));
        }
        if self.classifier.max_iter == 0 {
            return Err(AuditError::config("classifier.max_iter must be at least 1"));
        }
        GroupPartition::new(
            self.partition.attribute.clone(),
            self.partition.privileged,
            self.partition.unprivileged,
        )
        .map_err(|e| AuditError::config(format!("partition: {e}")))
    }

    /// Seed after [`validate`](Self::validate) succeeded.
    pub fn require_seed(&self) -> Result<u64, AuditError> {
        self.seed
            .ok_or_else(|| AuditError::config("no classifier seed configured"))
    }
}

/// Values set on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "DatasetOverrides::is_empty")]
    pub dataset: DatasetOverrides,
    #[serde(skip_serializing_if = "ReportOverrides::is_empty")]
    pub report: ReportOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl DatasetOverrides {
    fn is_empty(&self) -> bool {
        self.path.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
}

impl ReportOverrides {
    fn is_empty(&self) -> bool {
        self.chart.is_none() && self.chart_path.is_none() && self.json_path.is_none()
    }
}

/// User-level config file, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "fairaudit", "fairaudit")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration with layered merging.
///
/// Priority (highest first):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `FAIRAUDIT_`)
/// 3. The explicit file, or else `<workspace>/fairaudit.toml`
/// 4. User config (`~/.config/fairaudit/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<AuditConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AuditConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Box::new(figment::Error::from(format!(
                    "config file {} does not exist",
                    path.display()
                ))));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            if let Some(ws) = workspace {
                let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
                if ws_config.exists() {
                    figment = figment.merge(Toml::file(&ws_config));
                }
            }
        }
    }

    // FAIRAUDIT_SEED, FAIRAUDIT_PARTITION__ATTRIBUTE, FAIRAUDIT_REPORT__CHART_PATH, ...
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: AuditConfig = figment.extract().map_err(Box::new)?;
    let dataset_path = overrides.and_then(|o| o.dataset.path.as_ref());
    if let (Some(path), DatasetSource::Synthetic(_)) = (dataset_path, &config.dataset) {
        return Err(Box::new(figment::Error::from(format!(
            "dataset path {} given, but the configured dataset is synthetic and reads no file",
            path.display()
        ))));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Solver;
    use crate::synthetic::SyntheticSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_mirror_compas_race_audit() {
        let config = AuditConfig::default();
        assert_eq!(config.seed, None);
        assert!(matches!(config.dataset, DatasetSource::Compas { .. }));
        assert_eq!(config.partition.attribute, "race");
        assert_eq!(config.partition.privileged, 0.0);
        assert_eq!(config.partition.unprivileged, 1.0);
        assert_eq!(config.classifier.c, 1.0);
        assert!(config.report.chart);
        assert_eq!(config.report.chart_path, PathBuf::from("compas_fairness_metrics.png"));
    }

    #[test]
    fn test_validate_requires_seed() {
        let err = AuditConfig::default().validate().unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
        assert!(err.to_string().contains("seed"));

        let config = AuditConfig {
            seed: Some(42),
            ..Default::default()
        };
        let partition = config.validate().unwrap();
        assert_eq!(partition.attribute(), "race");
        assert_eq!(config.require_seed().unwrap(), 42);
    }

    #[test]
    fn test_validate_rejects_identical_group_values() {
        let mut config = AuditConfig {
            seed: Some(1),
            ..Default::default()
        };
        config.partition.privileged = 1.0;
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_non_positive_c() {
        let mut config = AuditConfig {
            seed: Some(1),
            ..Default::default()
        };
        config.classifier.c = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_with_overrides() {
        let overrides = ConfigOverrides {
            seed: Some(7),
            dataset: DatasetOverrides {
                path: Some(PathBuf::from("data/compas.csv")),
            },
            report: ReportOverrides {
                chart: Some(false),
                ..Default::default()
            },
        };
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path()), None, Some(&overrides)).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(
            config.dataset,
            DatasetSource::Compas {
                path: PathBuf::from("data/compas.csv")
            }
        );
        assert!(!config.report.chart);
        assert_eq!(config.report.chart_path, PathBuf::from(DEFAULT_CHART_FILE));
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            r#"
seed = 11

[dataset]
type = "synthetic"
privileged = 20
unprivileged = 30

[partition]
attribute = "group"
privileged = 1.0
unprivileged = 0.0

[classifier]
solver = "sgd"
max_iter = 50
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.seed, Some(11));
        assert_eq!(
            config.dataset,
            DatasetSource::Synthetic(SyntheticSpec {
                privileged: 20,
                unprivileged: 30,
                ..Default::default()
            })
        );
        assert_eq!(config.partition.attribute, "group");
        assert_eq!(config.classifier.solver, Solver::Sgd);
        assert_eq!(config.classifier.max_iter, 50);
        assert_eq!(config.classifier.c, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dataset_path_rejected_for_synthetic_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            "seed = 3\n[dataset]\ntype = \"synthetic\"\n",
        )
        .unwrap();
        let overrides = ConfigOverrides {
            dataset: DatasetOverrides {
                path: Some(PathBuf::from("data/other.csv")),
            },
            ..Default::default()
        };
        let err = load_config(Some(dir.path()), None, Some(&overrides)).unwrap_err();
        assert!(err.to_string().contains("data/other.csv"), "{err}");
        assert!(err.to_string().contains("synthetic"));

        // without the flag the same file loads
        assert!(load_config(Some(dir.path()), None, None).is_ok());
    }

    #[test]
    fn test_explicit_file_replaces_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(WORKSPACE_CONFIG_FILE), "seed = 1\n").unwrap();
        let explicit = dir.path().join("other.toml");
        std::fs::write(&explicit, "[partition]\nattribute = \"sex\"\n").unwrap();

        let config = load_config(Some(dir.path()), Some(&explicit), None).unwrap();
        assert_eq!(config.partition.attribute, "sex");
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(None, Some(&missing), None).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
