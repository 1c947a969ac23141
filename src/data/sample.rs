//! Synthetic loan-application sample generation.
//!
//! The generator draws applications from a hidden linear approval policy plus
//! Gaussian noise, then flips a configurable fraction of decisions. The flips
//! simulate historical manual overrides, so a screen over the generated file
//! has genuine exceptions to find. Everything is seeded and deterministic.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::LoanRow;
use crate::error::AppError;
use crate::io::tmp_sibling;

/// Reference scales used to normalize features inside the hidden policy.
/// These are population constants, not fitted values, so each row's latent
/// score depends only on that row and the seed.
const SCORE_MEAN: f64 = 690.0;
const SCORE_SD: f64 = 75.0;
const LN_INCOME_MEAN: f64 = 10.86;
const LN_INCOME_SD: f64 = 0.45;
const LN_AMOUNT_MEAN: f64 = 9.39;
const LN_AMOUNT_SD: f64 = 0.60;
const DTI_MEAN: f64 = 0.32;
const DTI_SD: f64 = 0.12;
const PTI_MEAN: f64 = 0.12;
const PTI_SD: f64 = 0.05;

const TERMS: [f64; 5] = [12.0, 24.0, 36.0, 48.0, 60.0];

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub count: usize,
    pub seed: u64,
    /// Fraction of decisions flipped after the policy fires.
    pub override_rate: f64,
}

/// Generate synthetic application rows.
pub fn generate_sample(config: &SampleConfig) -> Result<Vec<LoanRow>, AppError> {
    if config.count == 0 {
        return Err(AppError::new(2, "Sample count must be > 0."));
    }
    if !(config.override_rate.is_finite() && (0.0..1.0).contains(&config.override_rate)) {
        return Err(AppError::new(
            2,
            format!("Override rate must lie in [0, 1), got {}.", config.override_rate),
        ));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut rows = Vec::with_capacity(config.count);
    for i in 0..config.count {
        let credit_score = (SCORE_MEAN + SCORE_SD * normal.sample(&mut rng)).clamp(300.0, 850.0);
        let annual_income = (LN_INCOME_MEAN + LN_INCOME_SD * normal.sample(&mut rng))
            .exp()
            .clamp(8_000.0, 400_000.0)
            .round();
        let loan_amount = (LN_AMOUNT_MEAN + LN_AMOUNT_SD * normal.sample(&mut rng))
            .exp()
            .clamp(1_000.0, 80_000.0)
            .round();
        let term_months = TERMS[rng.gen_range(0..TERMS.len())];
        let debt_to_income = (DTI_MEAN + DTI_SD * normal.sample(&mut rng)).clamp(0.0, 0.95);
        let payment_to_income = (PTI_MEAN + PTI_SD * normal.sample(&mut rng)).clamp(0.01, 0.60);

        // Hidden policy: affordability-weighted latent score with noise.
        let latent = 2.2 * ((credit_score - SCORE_MEAN) / SCORE_SD)
            + 1.1 * ((annual_income.ln() - LN_INCOME_MEAN) / LN_INCOME_SD)
            - 0.9 * ((loan_amount.ln() - LN_AMOUNT_MEAN) / LN_AMOUNT_SD)
            - 0.5 * ((debt_to_income - DTI_MEAN) / DTI_SD)
            - 0.4 * ((payment_to_income - PTI_MEAN) / PTI_SD)
            - 0.2 * ((term_months - 36.0) / 18.0)
            + 0.8 * normal.sample(&mut rng);

        let mut approved = latent > 0.0;
        if rng.gen_bool(config.override_rate) {
            approved = !approved;
        }

        rows.push(LoanRow {
            application_id: format!("APP-{:06}", i + 1),
            credit_score: credit_score.round(),
            annual_income,
            loan_amount,
            term_months,
            debt_to_income: (debt_to_income * 1e4).round() / 1e4,
            payment_to_income: (payment_to_income * 1e4).round() / 1e4,
            approved,
        });
    }

    Ok(rows)
}

/// Write sample rows as an input CSV (all-or-nothing).
pub fn write_sample_csv(path: &Path, rows: &[LoanRow]) -> Result<(), AppError> {
    let tmp = tmp_sibling(path);
    let mut file = File::create(&tmp).map_err(|e| {
        AppError::new(2, format!("Failed to create sample CSV '{}': {e}", tmp.display()))
    })?;

    writeln!(
        file,
        "application_id,credit_score,annual_income,loan_amount,term_months,debt_to_income,payment_to_income,approved"
    )
    .map_err(|e| AppError::new(2, format!("Failed to write sample CSV header: {e}")))?;

    for r in rows {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{}",
            r.application_id,
            r.credit_score,
            r.annual_income,
            r.loan_amount,
            r.term_months,
            r.debt_to_income,
            r.payment_to_income,
            if r.approved { 1 } else { 0 },
        )
        .map_err(|e| AppError::new(2, format!("Failed to write sample CSV row: {e}")))?;
    }

    file.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush sample CSV: {e}")))?;
    drop(file);

    std::fs::rename(&tmp, path).map_err(|e| {
        AppError::new(2, format!("Failed to finalize sample CSV '{}': {e}", path.display()))
    })?;

    Ok(())
}
