//! Design-row construction for the approval model.
//!
//! A record maps to one row of the design matrix:
//!
//! - intercept
//! - standardized continuous fields (means/stds from the training split only)
//! - dummy-encoded bands, first variant of each band enum as the reference
//!   category
//!
//! Band enums are closed, so every category a record can carry is known at
//! compile time; there is no "unseen category" case at prediction time.

use crate::domain::{AmountBand, DurationBand, IncomeBand, LoanRecord, RiskBand};

/// Number of continuous input fields.
pub const CONTINUOUS_LEN: usize = 6;

/// Total design-row width: intercept + continuous + band dummies.
pub fn feature_len() -> usize {
    1 + CONTINUOUS_LEN
        + (RiskBand::ALL.len() - 1)
        + (IncomeBand::ALL.len() - 1)
        + (AmountBand::ALL.len() - 1)
        + (DurationBand::ALL.len() - 1)
}

/// Human-readable names for each design column, in row order.
pub fn feature_names() -> Vec<String> {
    let mut names = vec![
        "intercept".to_string(),
        "credit_score".to_string(),
        "annual_income".to_string(),
        "loan_amount".to_string(),
        "term_months".to_string(),
        "debt_to_income".to_string(),
        "payment_to_income".to_string(),
    ];
    for band in &RiskBand::ALL[1..] {
        names.push(format!("risk={}", band.display_name()));
    }
    for band in &IncomeBand::ALL[1..] {
        names.push(format!("income={}", band.display_name()));
    }
    for band in &AmountBand::ALL[1..] {
        names.push(format!("amount={}", band.display_name()));
    }
    for band in &DurationBand::ALL[1..] {
        names.push(format!("duration={}", band.display_name()));
    }
    names
}

fn continuous(record: &LoanRecord) -> [f64; CONTINUOUS_LEN] {
    [
        record.credit_score,
        record.annual_income,
        record.loan_amount,
        record.term_months,
        record.debt_to_income,
        record.payment_to_income,
    ]
}

/// Standardization parameters for the continuous fields.
///
/// Fitted on the training split only; prediction reuses the stored values so
/// train and score see the same transform.
#[derive(Debug, Clone)]
pub struct FeatureSpec {
    means: [f64; CONTINUOUS_LEN],
    stds: [f64; CONTINUOUS_LEN],
}

impl FeatureSpec {
    /// Compute means and standard deviations over the given records.
    ///
    /// Zero-variance columns get a unit scale so standardization stays total.
    pub fn fit(records: &[&LoanRecord]) -> Self {
        let n = records.len().max(1) as f64;
        let mut means = [0.0; CONTINUOUS_LEN];
        let mut stds = [0.0; CONTINUOUS_LEN];

        for record in records {
            let values = continuous(record);
            for (mean, value) in means.iter_mut().zip(values.iter()) {
                *mean += value;
            }
        }
        for mean in means.iter_mut() {
            *mean /= n;
        }

        for record in records {
            let values = continuous(record);
            for ((std, value), mean) in stds.iter_mut().zip(values.iter()).zip(means.iter()) {
                let d = value - mean;
                *std += d * d;
            }
        }
        for std in stds.iter_mut() {
            *std = (*std / n).sqrt();
            if !std.is_finite() || *std < 1e-12 {
                *std = 1.0;
            }
        }

        Self { means, stds }
    }

    /// Fill a design row for the given record.
    ///
    /// # Panics
    /// Panics if `out` does not have length [`feature_len`]. Callers should
    /// size the row correctly.
    pub fn encode(&self, record: &LoanRecord, out: &mut [f64]) {
        out.fill(0.0);
        out[0] = 1.0;

        let values = continuous(record);
        for (i, (value, (mean, std))) in values
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .enumerate()
        {
            out[1 + i] = (value - mean) / std;
        }

        let mut offset = 1 + CONTINUOUS_LEN;
        if let Some(pos) = RiskBand::ALL[1..].iter().position(|b| *b == record.bands.risk) {
            out[offset + pos] = 1.0;
        }
        offset += RiskBand::ALL.len() - 1;
        if let Some(pos) = IncomeBand::ALL[1..].iter().position(|b| *b == record.bands.income) {
            out[offset + pos] = 1.0;
        }
        offset += IncomeBand::ALL.len() - 1;
        if let Some(pos) = AmountBand::ALL[1..].iter().position(|b| *b == record.bands.amount) {
            out[offset + pos] = 1.0;
        }
        offset += AmountBand::ALL.len() - 1;
        if let Some(pos) = DurationBand::ALL[1..]
            .iter()
            .position(|b| *b == record.bands.duration)
        {
            out[offset + pos] = 1.0;
        }
    }
}
