// src/reporting/mod.rs
//! Rendering of analysis reports for the CLI.

pub mod console;
pub mod shared;

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::report::{AnalysisReport, UnitRecord};

/// One analyzed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip)]
    pub source: String,
    pub report: AnalysisReport,
}

/// Every file of one `qtrace scan` run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub files: Vec<FileReport>,
    /// Highest per-file overall risk.
    pub overall_risk: f64,
    pub degraded: bool,
}

impl ScanSummary {
    #[must_use]
    pub fn new(files: Vec<FileReport>) -> Self {
        let overall_risk = files
            .iter()
            .map(|f| f.report.overall_risk)
            .fold(0.0, f64::max);
        let degraded = files.iter().any(|f| f.report.degraded);
        Self {
            files,
            overall_risk,
            degraded,
        }
    }

    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.files.iter().map(|f| f.report.units.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
struct FileRecords<'a> {
    path: &'a PathBuf,
    records: Vec<UnitRecord>,
}

/// Pretty JSON of the full summary.
///
/// # Errors
/// Returns error if serialization fails.
pub fn to_json(summary: &ScanSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Pretty JSON of the flat per-unit records, grouped by file.
///
/// # Errors
/// Returns error if serialization fails.
pub fn to_records_json(summary: &ScanSummary) -> Result<String> {
    let grouped: Vec<FileRecords<'_>> = summary
        .files
        .iter()
        .map(|f| FileRecords {
            path: &f.path,
            records: f.report.records(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&grouped)?)
}
