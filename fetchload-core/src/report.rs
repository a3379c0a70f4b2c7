// Run reports

use crate::data::RunSummary;
use colored::Colorize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub url: String,
    pub table: String,
    pub db_path: String,
    pub records_decoded: usize,
    pub rows_written: usize,
    pub mode: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Human readable summary of a finished run
pub fn generate_load_report(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "━".repeat(52).bright_blue()));
    out.push_str(&format!("{}\n", "  LOAD COMPLETE".green().bold()));
    out.push_str(&format!("{}\n", "━".repeat(52).bright_blue()));
    out.push_str(&format!("  Source:          {}\n", report.url.bright_white()));
    out.push_str(&format!("  Database:        {}\n", report.db_path.bright_white()));
    out.push_str(&format!("  Table:           {}\n", report.table.bright_white()));
    out.push_str(&format!("  Mode:            {}\n", report.mode));
    out.push_str(&format!(
        "  Records decoded: {}\n",
        report.records_decoded.to_string().cyan()
    ));
    out.push_str(&format!(
        "  Rows written:    {}\n",
        report.rows_written.to_string().cyan()
    ));
    out.push_str(&format!("  Elapsed:         {} ms\n", report.elapsed_ms));
    out.push_str(&format!("  Run id:          {}\n", report.run_id.dimmed()));
    out
}

/// Tabular listing of the run log
pub fn generate_runs_report(runs: &[RunSummary]) -> String {
    if runs.is_empty() {
        return "No runs recorded yet.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<20} {:<16} {:>8} {:>8}  {:<12} {}\n",
        "finished", "table", "decoded", "written", "mode", "url"
    ));
    for run in runs {
        let finished = chrono::DateTime::from_timestamp(run.finished_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| run.finished_at.to_string());
        out.push_str(&format!(
            "{:<20} {:<16} {:>8} {:>8}  {:<12} {}\n",
            finished, run.table_name, run.records_decoded, run.rows_written, run.mode, run.url
        ));
    }
    out
}

pub fn generate_json_report(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
