//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and scoring
//! - exported to JSON/CSV
//! - staged into the optional relational store and reloaded later

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::bands::{AmountBand, DurationBand, IncomeBand, RiskBand};
use crate::error::AppError;

/// Default upper confidence threshold for the exception detector.
pub const DEFAULT_HI_THRESHOLD: f64 = 0.90;
/// Default lower confidence threshold for the exception detector.
pub const DEFAULT_LO_THRESHOLD: f64 = 0.10;

/// A raw row of CSV inputs, parsed but not yet validated against domain rules.
///
/// This mirrors the documented input schema and allows row-level validation
/// with good error messages before normalization.
#[derive(Debug, Clone)]
pub struct LoanRow {
    pub application_id: String,
    pub credit_score: f64,
    pub annual_income: f64,
    pub loan_amount: f64,
    pub term_months: f64,
    pub debt_to_income: f64,
    pub payment_to_income: f64,
    pub approved: bool,
}

/// Derived categorical bands for one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBands {
    pub risk: RiskBand,
    pub income: IncomeBand,
    pub amount: AmountBand,
    pub duration: DurationBand,
}

/// A normalized application record, immutable once loaded.
///
/// Bands are either derived in-process during ingest or supplied pre-computed
/// by the staging store; downstream code must not care which.
#[derive(Debug, Clone)]
pub struct LoanRecord {
    pub application_id: String,
    pub credit_score: f64,
    pub annual_income: f64,
    pub loan_amount: f64,
    pub term_months: f64,
    pub debt_to_income: f64,
    pub payment_to_income: f64,
    pub bands: LoanBands,
    /// Historical outcome: `true` = approved, `false` = rejected.
    pub approved: bool,
}

/// Exception classification for one scored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionTag {
    /// Model and history broadly agree, or the model is not confident enough
    /// to assert disagreement.
    Normal,
    /// Model is highly confident the application should be approved, yet
    /// history rejected it.
    UnderApproval,
    /// Model is highly confident the application should be rejected, yet
    /// history approved it.
    OverApproval,
}

impl ExceptionTag {
    pub fn display_name(self) -> &'static str {
        match self {
            ExceptionTag::Normal => "normal",
            ExceptionTag::UnderApproval => "under-approval",
            ExceptionTag::OverApproval => "over-approval",
        }
    }

    /// Stable machine-readable name used in the scored CSV export.
    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionTag::Normal => "normal",
            ExceptionTag::UnderApproval => "under_approval",
            ExceptionTag::OverApproval => "over_approval",
        }
    }
}

/// Validated detector thresholds.
///
/// Invariant: `0 <= lo < hi <= 1`. Constructed only through [`Thresholds::new`],
/// which rejects degenerate configurations (`hi == lo`) and inverted ones
/// before any scoring happens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    hi: f64,
    lo: f64,
}

impl Thresholds {
    pub fn new(hi: f64, lo: f64) -> Result<Self, AppError> {
        if !(hi.is_finite() && lo.is_finite()) {
            return Err(AppError::new(2, "Thresholds must be finite."));
        }
        if !(0.0..=1.0).contains(&hi) || !(0.0..=1.0).contains(&lo) {
            return Err(AppError::new(
                2,
                format!("Thresholds must lie in [0, 1]: hi={hi}, lo={lo}."),
            ));
        }
        if lo >= hi {
            return Err(AppError::new(
                2,
                format!("Threshold ordering must satisfy lo < hi, got lo={lo}, hi={hi}."),
            ));
        }
        Ok(Self { hi, lo })
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }
}

/// An application record scored by the fitted model and classified by the
/// exception detector.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: LoanRecord,
    /// Predicted approval probability in `[0, 1]`.
    pub probability: f64,
    pub tag: ExceptionTag,
}

/// A per-record scoring warning (buggy-model guard).
///
/// Records with invalid predictions are excluded from aggregates, never
/// silently included.
#[derive(Debug, Clone)]
pub struct ScoreWarning {
    pub application_id: String,
    pub message: String,
}

/// Optional segment restriction for reporting.
///
/// The filter restricts which records are *reported* (counts, queues,
/// exports); classification itself is segment-agnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentFilter {
    pub risk: Option<RiskBand>,
    pub income: Option<IncomeBand>,
}

impl SegmentFilter {
    pub fn is_empty(&self) -> bool {
        self.risk.is_none() && self.income.is_none()
    }

    pub fn matches(&self, record: &LoanRecord) -> bool {
        if let Some(risk) = self.risk {
            if record.bands.risk != risk {
                return false;
            }
        }
        if let Some(income) = self.income {
            if record.bands.income != income {
                return false;
            }
        }
        true
    }
}

/// Binary confusion matrix on the held-out split at the 0.5 decision point.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_pos: usize,
    pub false_pos: usize,
    pub true_neg: usize,
    pub false_neg: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_pos + self.false_pos + self.true_neg + self.false_neg
    }

    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some((self.true_pos + self.true_neg) as f64 / total as f64)
    }

    pub fn precision_approved(&self) -> Option<f64> {
        ratio(self.true_pos, self.true_pos + self.false_pos)
    }

    pub fn recall_approved(&self) -> Option<f64> {
        ratio(self.true_pos, self.true_pos + self.false_neg)
    }

    pub fn precision_rejected(&self) -> Option<f64> {
        ratio(self.true_neg, self.true_neg + self.false_neg)
    }

    pub fn recall_rejected(&self) -> Option<f64> {
        ratio(self.true_neg, self.true_neg + self.false_pos)
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    if den == 0 {
        return None;
    }
    Some(num as f64 / den as f64)
}

/// Model evaluation diagnostics, computed once per fit on the held-out split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDiagnostics {
    pub n_train: usize,
    pub n_valid: usize,
    pub accuracy: Option<f64>,
    /// Rank-based ROC-AUC; `None` when the held-out split is single-class.
    pub auc: Option<f64>,
    pub confusion: ConfusionMatrix,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub csv_path: PathBuf,
    pub thresholds: Thresholds,
    pub seed: u64,
    /// Fraction of records used for fitting; the rest is held out.
    pub train_frac: f64,
    pub max_iter: usize,
    pub segment: SegmentFilter,
    pub top_n: usize,
    pub export_scored: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
    /// Optional SQLite staging database: when set, records are uploaded and
    /// then read back (with pre-computed band columns) before modeling.
    pub stage_db: Option<PathBuf>,
}
