//! Approval model: feature encoding, logistic fit, and evaluation.
//!
//! The fit relies on three primitive operations:
//! - encode a design row for a given record (standardized continuous fields
//!   plus dummy-encoded bands)
//! - solve a weighted least-squares problem (one IRLS step)
//! - predict an approval probability given fitted coefficients
//!
//! Evaluation (accuracy, ROC-AUC, confusion matrix) runs once per fit on the
//! held-out split and is reported alongside the exception screen.

pub mod features;
pub mod logit;
pub mod metrics;

pub use features::{FeatureSpec, feature_len, feature_names};
pub use logit::{FitSummary, FittedModel, fit_model};
pub use metrics::{confusion_at_half, roc_auc};
