//! Export the scored table to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream
//! scripts: original columns, derived bands, predicted probability, and the
//! exception tag.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::ScoredRecord;
use crate::error::AppError;
use crate::io::tmp_sibling;

/// Write the scored table to a CSV file (all-or-nothing).
pub fn write_scored_csv(path: &Path, scored: &[ScoredRecord]) -> Result<(), AppError> {
    let tmp = tmp_sibling(path);
    let mut file = File::create(&tmp).map_err(|e| {
        AppError::new(2, format!("Failed to create export CSV '{}': {e}", tmp.display()))
    })?;

    writeln!(
        file,
        "application_id,credit_score,annual_income,loan_amount,term_months,debt_to_income,payment_to_income,risk_band,income_band,amount_band,duration_band,approved,probability,exception"
    )
    .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for s in scored {
        let r = &s.record;
        writeln!(
            file,
            "{},{},{},{},{},{:.6},{:.6},{},{},{},{},{},{:.6},{}",
            r.application_id,
            r.credit_score,
            r.annual_income,
            r.loan_amount,
            r.term_months,
            r.debt_to_income,
            r.payment_to_income,
            r.bands.risk.display_name(),
            r.bands.income.display_name(),
            r.bands.amount.display_name(),
            r.bands.duration.display_name(),
            if r.approved { 1 } else { 0 },
            s.probability,
            s.tag.as_str(),
        )
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    file.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    drop(file);

    std::fs::rename(&tmp, path).map_err(|e| {
        AppError::new(2, format!("Failed to finalize export CSV '{}': {e}", path.display()))
    })?;

    Ok(())
}
