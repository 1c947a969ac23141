//! Shared domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - derived categorical bands (`RiskBand`, `IncomeBand`, `AmountBand`, `DurationBand`)
//! - normalized application records (`LoanRecord`)
//! - detector configuration (`Thresholds`) and outputs (`ExceptionTag`, `ScoredRecord`)
//! - model diagnostics (`ModelDiagnostics`, `ConfusionMatrix`)

pub mod bands;
pub mod types;

pub use bands::*;
pub use types::*;
