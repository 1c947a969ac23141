//! Write the run summary JSON artifact.
//!
//! Summary JSON is the "portable" representation of a run:
//! - detector thresholds and segment restriction
//! - model diagnostics and fitted coefficients
//! - exception counts, approval-rate heatmap, calibration table
//!
//! The presentation layer (static pages, chart renderers) consumes this file;
//! no rendering behavior lives in the core.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detect::ExceptionCounts;
use crate::domain::{ModelDiagnostics, SegmentFilter, Thresholds};
use crate::error::AppError;
use crate::io::tmp_sibling;
use crate::model::{FittedModel, feature_names};
use crate::report::{ApprovalHeatmap, CalibrationBucket};

/// One fitted coefficient, by design-column name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub value: f64,
}

/// The summary artifact schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummaryFile {
    pub tool: String,
    pub generated_at: String,
    pub thresholds: Thresholds,
    /// Reported segment restriction, if any (band display names).
    pub segment_risk: Option<String>,
    pub segment_income: Option<String>,
    pub n_records: usize,
    pub n_row_errors: usize,
    pub n_score_warnings: usize,
    pub diagnostics: ModelDiagnostics,
    pub coefficients: Vec<Coefficient>,
    pub exception_counts: ExceptionCounts,
    pub heatmap: ApprovalHeatmap,
    pub calibration: Vec<CalibrationBucket>,
}

/// Assemble the summary artifact from run outputs.
pub fn build_summary(
    thresholds: &Thresholds,
    segment: &SegmentFilter,
    model: &FittedModel,
    diagnostics: &ModelDiagnostics,
    counts: ExceptionCounts,
    heatmap: ApprovalHeatmap,
    calibration: Vec<CalibrationBucket>,
    n_records: usize,
    n_row_errors: usize,
    n_score_warnings: usize,
) -> RunSummaryFile {
    let coefficients = feature_names()
        .into_iter()
        .zip(model.betas.iter())
        .map(|(name, &value)| Coefficient { name, value })
        .collect();

    RunSummaryFile {
        tool: "pmirror".to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        thresholds: *thresholds,
        segment_risk: segment.risk.map(|b| b.display_name().to_string()),
        segment_income: segment.income.map(|b| b.display_name().to_string()),
        n_records,
        n_row_errors,
        n_score_warnings,
        diagnostics: diagnostics.clone(),
        coefficients,
        exception_counts: counts,
        heatmap,
        calibration,
    }
}

/// Write the summary JSON file (all-or-nothing).
pub fn write_summary_json(path: &Path, summary: &RunSummaryFile) -> Result<(), AppError> {
    let tmp = tmp_sibling(path);
    let file = File::create(&tmp).map_err(|e| {
        AppError::new(2, format!("Failed to create summary JSON '{}': {e}", tmp.display()))
    })?;

    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;

    std::fs::rename(&tmp, path).map_err(|e| {
        AppError::new(2, format!("Failed to finalize summary JSON '{}': {e}", path.display()))
    })?;

    Ok(())
}

/// Read a summary JSON file back (used by downstream tooling and tests).
pub fn read_summary_json(path: &Path) -> Result<RunSummaryFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    let summary: RunSummaryFile = serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid summary JSON: {e}")))?;
    Ok(summary)
}
