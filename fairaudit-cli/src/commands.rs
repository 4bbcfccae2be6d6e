//! Subcommand handlers.

use anyhow::Context;
use fairaudit_core::chart::BarChartSink;
use fairaudit_core::config::{self, AuditConfig, ConfigOverrides, WORKSPACE_CONFIG_FILE};
use fairaudit_core::loader::{DatasetSource, load_dataset};
use fairaudit_core::report::{ReportSink, TextSink, write_json_report};
use fairaudit_core::synthetic::{self, SyntheticSpec};
use fairaudit_core::{AuditReport, FairnessAudit, LogisticRegression};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the audit and print the metrics table (default)
    Run,
    /// Show or initialise configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Load the configured dataset and print its summary
    Summary,
    /// Write a synthetic dataset with known label bias as CSV
    Synth {
        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
        /// Privileged group size
        #[arg(long, default_value_t = 50)]
        privileged: usize,
        /// Unprivileged group size
        #[arg(long, default_value_t = 50)]
        unprivileged: usize,
        /// Favorable rate in the privileged group
        #[arg(long, default_value_t = 0.8)]
        privileged_rate: f64,
        /// Favorable rate in the unprivileged group
        #[arg(long, default_value_t = 0.4)]
        unprivileged_rate: f64,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration as TOML (default)
    Show,
    /// Write the default configuration to the workspace fairaudit.toml
    Init,
}

/// Where configuration comes from for this process.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub workspace: PathBuf,
    pub config: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

impl Invocation {
    fn load_config(&self) -> anyhow::Result<AuditConfig> {
        config::load_config(
            Some(&self.workspace),
            self.config.as_deref(),
            Some(&self.overrides),
        )
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
    }

    /// Relative paths in configuration resolve against the workspace.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    fn resolve_source(&self, source: &DatasetSource) -> DatasetSource {
        match source {
            DatasetSource::Compas { path } => DatasetSource::Compas {
                path: self.resolve(path),
            },
            DatasetSource::Csv(spec) => {
                let mut spec = spec.clone();
                spec.path = self.resolve(&spec.path);
                DatasetSource::Csv(spec)
            }
            DatasetSource::Synthetic(spec) => DatasetSource::Synthetic(spec.clone()),
        }
    }
}

pub fn handle_command(
    command: Commands,
    invocation: &Invocation,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Run => run_audit(invocation, out).map(|_| ()),
        Commands::Config { action } => {
            handle_config(action.unwrap_or(ConfigAction::Show), invocation, out)
        }
        Commands::Summary => summary(invocation, out),
        Commands::Synth {
            output,
            privileged,
            unprivileged,
            privileged_rate,
            unprivileged_rate,
        } => {
            let spec = SyntheticSpec {
                privileged,
                unprivileged,
                privileged_favorable_rate: privileged_rate,
                unprivileged_favorable_rate: unprivileged_rate,
                seed: invocation.overrides.seed.unwrap_or_default(),
                ..Default::default()
            };
            synth(&spec, &output, out)
        }
    }
}

/// Load, audit, print the table, then write the chart and JSON report.
pub fn run_audit(invocation: &Invocation, out: &mut impl Write) -> anyhow::Result<AuditReport> {
    let config = invocation.load_config()?;
    let partition = config.validate()?;
    let seed = config.require_seed()?;

    let source = invocation.resolve_source(&config.dataset);
    let dataset = load_dataset(&source)
        .with_context(|| format!("Failed to load dataset {}", source.describe()))?;

    let classifier = LogisticRegression::new(config.classifier.clone(), seed);
    let report = FairnessAudit::new(partition, classifier)
        .with_seed(seed)
        .run(&dataset)?;

    TextSink::new(&mut *out).render(&report.table)?;

    if config.report.chart {
        let mut chart = BarChartSink::new(invocation.resolve(&config.report.chart_path));
        if let Some(title) = &config.report.chart_title {
            chart = chart.with_title(title.clone());
        }
        chart.render(&report.table)?;
        writeln!(out, "\nChart saved to {}", chart.path().display())?;
    }
    if let Some(json_path) = &config.report.json_path {
        let json_path = invocation.resolve(json_path);
        write_json_report(&report, &json_path)?;
        writeln!(out, "Report saved to {}", json_path.display())?;
    }

    info!(run_id = %report.run_id, "Audit complete");
    Ok(report)
}

fn handle_config(
    action: ConfigAction,
    invocation: &Invocation,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = invocation.load_config()?;
            let toml_str = toml::to_string_pretty(&config)?;
            writeln!(out, "{}", toml_str)?;
            Ok(())
        }
        ConfigAction::Init => {
            let config_path = invocation.workspace.join(WORKSPACE_CONFIG_FILE);
            if config_path.exists() {
                anyhow::bail!(
                    "Configuration already exists at {}",
                    config_path.display()
                );
            }
            let toml_str = toml::to_string_pretty(&AuditConfig::default())?;
            std::fs::write(&config_path, format!("# seed = 42\n{toml_str}"))?;
            writeln!(
                out,
                "Created default configuration at: {}",
                config_path.display()
            )?;
            Ok(())
        }
    }
}

fn summary(invocation: &Invocation, out: &mut impl Write) -> anyhow::Result<()> {
    let config = invocation.load_config()?;
    let source = invocation.resolve_source(&config.dataset);
    let dataset = load_dataset(&source)
        .with_context(|| format!("Failed to load dataset {}", source.describe()))?;
    let summary = dataset.summary();

    writeln!(out, "Source: {}", source.describe())?;
    writeln!(
        out,
        "Features shape: ({}, {})",
        summary.num_records, summary.num_features
    )?;
    writeln!(
        out,
        "Protected attributes: {}",
        summary.protected_attributes.join(", ")
    )?;
    writeln!(out, "Favorable label: {}", summary.favorable_label)?;
    writeln!(out, "Unfavorable label: {}", summary.unfavorable_label)?;
    writeln!(
        out,
        "Favorable records: {} of {}",
        summary.favorable_count, summary.num_records
    )?;
    writeln!(out, "Fingerprint: {}", summary.fingerprint)?;
    Ok(())
}

fn synth(spec: &SyntheticSpec, output: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let dataset = spec.generate()?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    synthetic::write_csv(&dataset, output)?;
    writeln!(
        out,
        "Wrote {} records to {} (protected attribute '{}', label '{}')",
        dataset.len(),
        output.display(),
        synthetic::GROUP_ATTRIBUTE,
        synthetic::LABEL_COLUMN
    )?;
    Ok(())
}
