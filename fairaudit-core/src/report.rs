//! Reporting sinks for the metrics table, and JSON persistence of full reports.

use crate::audit::AuditReport;
use crate::error::AuditError;
use crate::table::MetricsTable;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Consumer of a finished metrics table.
pub trait ReportSink {
    fn render(&mut self, table: &MetricsTable) -> Result<(), AuditError>;
}

/// Writes the aligned text rendering of the table.
pub struct TextSink<W> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl TextSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn render(&mut self, table: &MetricsTable) -> Result<(), AuditError> {
        self.writer.write_all(table.render_text().as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Persist the whole report as pretty JSON, creating parent directories.
pub fn write_json_report(report: &AuditReport, path: &Path) -> Result<(), AuditError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    info!(path = %path.display(), run_id = %report.run_id, "Wrote JSON report");
    Ok(())
}

/// Read back a report written by [`write_json_report`].
pub fn read_json_report(path: &Path) -> Result<AuditReport, AuditError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
