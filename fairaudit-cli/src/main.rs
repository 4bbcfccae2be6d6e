//! fairaudit CLI: measure, reweigh, retrain and re-measure demographic bias.
//!
//! Running without a subcommand performs the audit.

mod commands;

use clap::Parser;
use fairaudit_core::config::{ConfigOverrides, DatasetOverrides, ReportOverrides};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// fairaudit: disparate impact and FPR difference before and after reweighing
#[derive(Parser, Debug)]
#[command(name = "fairaudit", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (where fairaudit.toml is looked up)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path (replaces the workspace fairaudit.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset file path (COMPAS or CSV sources only)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Classifier seed (required for audits, via flag, config or FAIRAUDIT_SEED)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Chart output path (.png or .svg)
    #[arg(long, global = true)]
    chart: Option<PathBuf>,

    /// Skip the chart
    #[arg(long, global = true, conflicts_with = "chart")]
    no_chart: bool,

    /// Also write the full report as JSON
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<commands::Commands>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            seed: self.seed,
            dataset: DatasetOverrides {
                path: self.dataset.clone(),
            },
            report: ReportOverrides {
                chart: if self.no_chart {
                    Some(false)
                } else {
                    self.chart.as_ref().map(|_| true)
                },
                chart_path: self.chart.clone(),
                json_path: self.json.clone(),
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn,fairaudit_core=info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "fairaudit", "fairaudit")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "fairaudit.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cli.workspace.clone());

    let invocation = commands::Invocation {
        workspace,
        config: cli.config.clone(),
        overrides: cli.overrides(),
    };
    let command = cli.command.unwrap_or(commands::Commands::Run);
    commands::handle_command(command, &invocation, &mut std::io::stdout().lock())
}
