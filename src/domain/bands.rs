//! Categorical bands derived from continuous application fields.
//!
//! Every band is a deterministic bucketing of one continuous field over fixed
//! breakpoints. Intervals are closed on the left and open on the right —
//! `[a, b)` — with the last band unbounded above, so a boundary value always
//! belongs to the higher band.
//!
//! Derivation is total over non-negative finite input and fails explicitly on
//! anything else; the caller decides whether that rejects the record or the
//! whole run. There is no silent "unknown" fallback.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Credit-quality band derived from the credit score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RiskBand {
    /// `[0, 580)`
    Subprime,
    /// `[580, 670)`
    NearPrime,
    /// `[670, 740)`
    Prime,
    /// `[740, 800)`
    PrimePlus,
    /// `[800, ∞)`
    SuperPrime,
}

impl RiskBand {
    pub const ALL: [RiskBand; 5] = [
        RiskBand::Subprime,
        RiskBand::NearPrime,
        RiskBand::Prime,
        RiskBand::PrimePlus,
        RiskBand::SuperPrime,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            RiskBand::Subprime => "subprime",
            RiskBand::NearPrime => "near-prime",
            RiskBand::Prime => "prime",
            RiskBand::PrimePlus => "prime-plus",
            RiskBand::SuperPrime => "super-prime",
        }
    }

    pub fn from_score(score: f64) -> Result<Self, String> {
        check_band_input("credit_score", score)?;
        Ok(match score {
            s if s < 580.0 => RiskBand::Subprime,
            s if s < 670.0 => RiskBand::NearPrime,
            s if s < 740.0 => RiskBand::Prime,
            s if s < 800.0 => RiskBand::PrimePlus,
            _ => RiskBand::SuperPrime,
        })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.display_name() == name)
    }
}

/// Income band derived from annual income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeBand {
    /// `[0, 30_000)`
    Low,
    /// `[30_000, 60_000)`
    Middle,
    /// `[60_000, 100_000)`
    Upper,
    /// `[100_000, ∞)`
    High,
}

impl IncomeBand {
    pub const ALL: [IncomeBand; 4] = [
        IncomeBand::Low,
        IncomeBand::Middle,
        IncomeBand::Upper,
        IncomeBand::High,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            IncomeBand::Low => "low",
            IncomeBand::Middle => "middle",
            IncomeBand::Upper => "upper",
            IncomeBand::High => "high",
        }
    }

    pub fn from_income(income: f64) -> Result<Self, String> {
        check_band_input("annual_income", income)?;
        Ok(match income {
            v if v < 30_000.0 => IncomeBand::Low,
            v if v < 60_000.0 => IncomeBand::Middle,
            v if v < 100_000.0 => IncomeBand::Upper,
            _ => IncomeBand::High,
        })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.display_name() == name)
    }
}

/// Requested-amount band derived from the loan amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AmountBand {
    /// `[0, 5_000)`
    Small,
    /// `[5_000, 15_000)`
    Medium,
    /// `[15_000, 30_000)`
    Large,
    /// `[30_000, ∞)`
    Jumbo,
}

impl AmountBand {
    pub const ALL: [AmountBand; 4] = [
        AmountBand::Small,
        AmountBand::Medium,
        AmountBand::Large,
        AmountBand::Jumbo,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            AmountBand::Small => "small",
            AmountBand::Medium => "medium",
            AmountBand::Large => "large",
            AmountBand::Jumbo => "jumbo",
        }
    }

    pub fn from_amount(amount: f64) -> Result<Self, String> {
        check_band_input("loan_amount", amount)?;
        Ok(match amount {
            v if v < 5_000.0 => AmountBand::Small,
            v if v < 15_000.0 => AmountBand::Medium,
            v if v < 30_000.0 => AmountBand::Large,
            _ => AmountBand::Jumbo,
        })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.display_name() == name)
    }
}

/// Duration band derived from the term in months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DurationBand {
    /// `[0, 24)`
    Short,
    /// `[24, 48)`
    Medium,
    /// `[48, ∞)`
    Long,
}

impl DurationBand {
    pub const ALL: [DurationBand; 3] = [DurationBand::Short, DurationBand::Medium, DurationBand::Long];

    pub fn display_name(self) -> &'static str {
        match self {
            DurationBand::Short => "short",
            DurationBand::Medium => "medium",
            DurationBand::Long => "long",
        }
    }

    pub fn from_term_months(term: f64) -> Result<Self, String> {
        check_band_input("term_months", term)?;
        Ok(match term {
            v if v < 24.0 => DurationBand::Short,
            v if v < 48.0 => DurationBand::Medium,
            _ => DurationBand::Long,
        })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.display_name() == name)
    }
}

fn check_band_input(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("Non-finite `{field}` value."));
    }
    if value < 0.0 {
        return Err(format!("Negative `{field}` value ({value})."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_band_boundaries_are_left_closed() {
        assert_eq!(RiskBand::from_score(579.999).unwrap(), RiskBand::Subprime);
        assert_eq!(RiskBand::from_score(580.0).unwrap(), RiskBand::NearPrime);
        assert_eq!(RiskBand::from_score(670.0).unwrap(), RiskBand::Prime);
        assert_eq!(RiskBand::from_score(740.0).unwrap(), RiskBand::PrimePlus);
        assert_eq!(RiskBand::from_score(800.0).unwrap(), RiskBand::SuperPrime);
    }

    #[test]
    fn income_band_boundaries_are_left_closed() {
        assert_eq!(IncomeBand::from_income(29_999.99).unwrap(), IncomeBand::Low);
        assert_eq!(IncomeBand::from_income(30_000.0).unwrap(), IncomeBand::Middle);
        assert_eq!(IncomeBand::from_income(60_000.0).unwrap(), IncomeBand::Upper);
        assert_eq!(IncomeBand::from_income(100_000.0).unwrap(), IncomeBand::High);
    }

    #[test]
    fn bands_reject_out_of_domain_input() {
        assert!(RiskBand::from_score(-1.0).is_err());
        assert!(RiskBand::from_score(f64::NAN).is_err());
        assert!(IncomeBand::from_income(f64::NEG_INFINITY).is_err());
        assert!(AmountBand::from_amount(-0.01).is_err());
        assert!(DurationBand::from_term_months(f64::INFINITY).is_err());
    }

    #[test]
    fn band_derivation_is_monotonic() {
        // Increasing the input must never move a record to a lower-ordered band.
        let mut prev = RiskBand::from_score(0.0).unwrap();
        for i in 0..1700 {
            let band = RiskBand::from_score(i as f64 * 0.5).unwrap();
            assert!(band >= prev);
            prev = band;
        }

        let mut prev = IncomeBand::from_income(0.0).unwrap();
        for i in 0..1200 {
            let band = IncomeBand::from_income(i as f64 * 100.0).unwrap();
            assert!(band >= prev);
            prev = band;
        }
    }

    #[test]
    fn band_derivation_is_total_over_domain() {
        for i in 0..5000 {
            let v = i as f64 * 11.0;
            RiskBand::from_score(v).unwrap();
            IncomeBand::from_income(v * 40.0).unwrap();
            AmountBand::from_amount(v * 10.0).unwrap();
            DurationBand::from_term_months(v * 0.05).unwrap();
        }
    }

    #[test]
    fn band_names_round_trip() {
        for band in RiskBand::ALL {
            assert_eq!(RiskBand::from_name(band.display_name()), Some(band));
        }
        for band in IncomeBand::ALL {
            assert_eq!(IncomeBand::from_name(band.display_name()), Some(band));
        }
        for band in AmountBand::ALL {
            assert_eq!(AmountBand::from_name(band.display_name()), Some(band));
        }
        for band in DurationBand::ALL {
            assert_eq!(DurationBand::from_name(band.display_name()), Some(band));
        }
    }
}
