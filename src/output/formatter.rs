//! Output formatters for run results
//!
//! Table, JSON, CSV and one-line summary renderings of a [`SuiteSummary`].

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::models::{SuiteSummary, TestResult, TestStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" | "brief" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn status_label(&self, status: TestStatus) -> &'static str {
        if self.colorize {
            match status {
                TestStatus::Pass => "\x1b[32m✓ PASS\x1b[0m",
                TestStatus::Fail => "\x1b[31m✗ FAIL\x1b[0m",
                TestStatus::Skip => "\x1b[33m○ SKIP\x1b[0m",
                TestStatus::Error => "\x1b[31m! ERROR\x1b[0m",
            }
        } else {
            match status {
                TestStatus::Pass => "✓ PASS",
                TestStatus::Fail => "✗ FAIL",
                TestStatus::Skip => "○ SKIP",
                TestStatus::Error => "! ERROR",
            }
        }
    }

    fn format_result_row(&self, result: &TestResult) -> String {
        let mut row = format!(
            "{:48} {} [{:>8}ms]",
            result.name,
            self.status_label(result.status),
            result.duration_ms
        );
        if result.status != TestStatus::Pass {
            if let Some(msg) = &result.message {
                row.push_str(&format!("\n      {msg}"));
            }
        }
        row
    }

    /// Render the whole run
    pub fn format_summary(&self, summary: &SuiteSummary) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_summary_table(summary)),
            OutputFormat::Json => {
                serde_json::to_string(summary).context("Failed to encode summary")
            }
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(summary).context("Failed to encode summary")
            }
            OutputFormat::Csv => self.format_summary_csv(summary),
            OutputFormat::Summary => Ok(self.format_summary_brief(summary)),
        }
    }

    fn format_summary_table(&self, summary: &SuiteSummary) -> String {
        let mut output = String::new();

        output.push_str("\n══════════════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Cluster {} in project {}\n",
            summary.cluster, summary.project
        ));
        output.push_str("══════════════════════════════════════════════════════════════════════\n");

        for result in &summary.results {
            output.push_str(&format!("  {}\n", self.format_result_row(result)));
        }

        output.push_str("──────────────────────────────────────────────────────────────────────\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Skip: {} | Error: {}\n",
            summary.total, pass_str, fail_str, summary.skipped, summary.errors
        ));
        output.push_str(&format!(
            "  Pass Rate: {:.1}% | Duration: {}ms\n",
            summary.pass_rate(),
            summary.total_duration_ms
        ));

        output
    }

    fn format_summary_csv(&self, summary: &SuiteSummary) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["name", "status", "duration_ms", "message"])?;
        for result in &summary.results {
            writer.write_record([
                result.name.clone(),
                result.status.to_string(),
                result.duration_ms.to_string(),
                result.message.clone().unwrap_or_default(),
            ])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {e}"))?;
        String::from_utf8(bytes).context("CSV output is not UTF-8")
    }

    fn format_summary_brief(&self, summary: &SuiteSummary) -> String {
        format!(
            "{}: {}/{} passed, {} skipped ({:.1}%) in {}ms",
            summary.cluster,
            summary.passed,
            summary.total,
            summary.skipped,
            summary.pass_rate(),
            summary.total_duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write the run as a pretty JSON report
pub fn write_report(path: &Path, summary: &SuiteSummary) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()?;

    info!("Wrote report to {}", path.display());
    Ok(())
}
