//! Aggregation views over classified records.
//!
//! These are reporting views, not additional detection logic: the heatmap
//! summarizes historical approval rates by segment, and the calibration table
//! sanity-checks that the model's confidence is meaningful before anyone
//! trusts the exception flags built on it.

use serde::{Deserialize, Serialize};

use crate::domain::{IncomeBand, RiskBand, ScoredRecord, SegmentFilter, Thresholds};

/// One cell of the approval-rate heatmap.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub n: usize,
    /// Mean historical outcome; `None` for empty cells.
    pub approval_rate: Option<f64>,
}

/// Historical approval rates over risk band × income band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalHeatmap {
    /// Row labels, in band order.
    pub risk_bands: Vec<String>,
    /// Column labels, in band order.
    pub income_bands: Vec<String>,
    /// `cells[row][col]` indexed by (risk, income).
    pub cells: Vec<Vec<HeatmapCell>>,
}

/// Build the approval-rate heatmap over the reported segment.
pub fn build_heatmap(scored: &[ScoredRecord], segment: &SegmentFilter) -> ApprovalHeatmap {
    let mut counts = vec![vec![(0usize, 0usize); IncomeBand::ALL.len()]; RiskBand::ALL.len()];

    for s in scored.iter().filter(|s| segment.matches(&s.record)) {
        let row = RiskBand::ALL
            .iter()
            .position(|b| *b == s.record.bands.risk)
            .unwrap_or(0);
        let col = IncomeBand::ALL
            .iter()
            .position(|b| *b == s.record.bands.income)
            .unwrap_or(0);
        counts[row][col].0 += 1;
        if s.record.approved {
            counts[row][col].1 += 1;
        }
    }

    let cells = counts
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(n, approved)| HeatmapCell {
                    n,
                    approval_rate: if n > 0 { Some(approved as f64 / n as f64) } else { None },
                })
                .collect()
        })
        .collect();

    ApprovalHeatmap {
        risk_bands: RiskBand::ALL.iter().map(|b| b.display_name().to_string()).collect(),
        income_bands: IncomeBand::ALL.iter().map(|b| b.display_name().to_string()).collect(),
        cells,
    }
}

/// One calibration bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub label: String,
    /// Inclusive probability bounds of the bucket.
    pub lo: f64,
    pub hi: f64,
    pub n: usize,
    pub mean_predicted: Option<f64>,
    pub observed_rate: Option<f64>,
}

/// Bucket predictions by the detector thresholds and compare predicted
/// confidence against observed approval rates.
///
/// Bucket edges deliberately reuse the detector thresholds (inclusive, like
/// the detector), so the check covers exactly the probability bands the
/// exception flags depend on. Calibration is a model-level check and ignores
/// any segment filter.
pub fn calibration_table(scored: &[ScoredRecord], thresholds: &Thresholds) -> Vec<CalibrationBucket> {
    let lo = thresholds.lo();
    let hi = thresholds.hi();

    let mut buckets = vec![
        (format!("p <= {lo:.2}"), 0.0, lo),
        (format!("{lo:.2} < p < {hi:.2}"), lo, hi),
        (format!("p >= {hi:.2}"), hi, 1.0),
    ]
    .into_iter()
    .map(|(label, b_lo, b_hi)| (label, b_lo, b_hi, 0usize, 0.0f64, 0usize))
    .collect::<Vec<_>>();

    for s in scored {
        let idx = if s.probability <= lo {
            0
        } else if s.probability >= hi {
            2
        } else {
            1
        };
        let bucket = &mut buckets[idx];
        bucket.3 += 1;
        bucket.4 += s.probability;
        if s.record.approved {
            bucket.5 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(label, b_lo, b_hi, n, sum_p, approved)| CalibrationBucket {
            label,
            lo: b_lo,
            hi: b_hi,
            n,
            mean_predicted: if n > 0 { Some(sum_p / n as f64) } else { None },
            observed_rate: if n > 0 { Some(approved as f64 / n as f64) } else { None },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AmountBand, DurationBand, ExceptionTag, LoanBands, LoanRecord, DEFAULT_HI_THRESHOLD,
        DEFAULT_LO_THRESHOLD,
    };

    fn scored(risk: RiskBand, income: IncomeBand, approved: bool, probability: f64) -> ScoredRecord {
        ScoredRecord {
            record: LoanRecord {
                application_id: "A".to_string(),
                credit_score: 700.0,
                annual_income: 50_000.0,
                loan_amount: 10_000.0,
                term_months: 36.0,
                debt_to_income: 0.3,
                payment_to_income: 0.1,
                bands: LoanBands {
                    risk,
                    income,
                    amount: AmountBand::Medium,
                    duration: DurationBand::Medium,
                },
                approved,
            },
            probability,
            tag: ExceptionTag::Normal,
        }
    }

    #[test]
    fn heatmap_cells_hold_mean_historical_outcome() {
        let scored = vec![
            scored(RiskBand::Prime, IncomeBand::Middle, true, 0.9),
            scored(RiskBand::Prime, IncomeBand::Middle, false, 0.4),
            scored(RiskBand::Subprime, IncomeBand::Low, false, 0.1),
        ];

        let heatmap = build_heatmap(&scored, &SegmentFilter::default());
        let prime = RiskBand::ALL.iter().position(|b| *b == RiskBand::Prime).unwrap();
        let middle = IncomeBand::ALL.iter().position(|b| *b == IncomeBand::Middle).unwrap();

        let cell = heatmap.cells[prime][middle];
        assert_eq!(cell.n, 2);
        assert!((cell.approval_rate.unwrap() - 0.5).abs() < 1e-12);

        let sub = RiskBand::ALL.iter().position(|b| *b == RiskBand::Subprime).unwrap();
        let low = IncomeBand::ALL.iter().position(|b| *b == IncomeBand::Low).unwrap();
        assert_eq!(heatmap.cells[sub][low].n, 1);
        assert!(heatmap.cells[sub][low].approval_rate.unwrap().abs() < 1e-12);

        // Empty cell stays empty rather than reading as 0% approval.
        let sup = RiskBand::ALL.iter().position(|b| *b == RiskBand::SuperPrime).unwrap();
        assert!(heatmap.cells[sup][low].approval_rate.is_none());
    }

    #[test]
    fn heatmap_respects_segment_filter() {
        let rows = vec![
            scored(RiskBand::Prime, IncomeBand::Middle, true, 0.9),
            scored(RiskBand::Subprime, IncomeBand::Middle, true, 0.9),
        ];
        let segment = SegmentFilter {
            risk: Some(RiskBand::Prime),
            income: None,
        };
        let heatmap = build_heatmap(&rows, &segment);
        let total: usize = heatmap.cells.iter().flatten().map(|c| c.n).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn calibration_buckets_follow_detector_thresholds() {
        let thresholds = Thresholds::new(DEFAULT_HI_THRESHOLD, DEFAULT_LO_THRESHOLD).unwrap();
        let rows = vec![
            scored(RiskBand::Prime, IncomeBand::Middle, false, 0.05),
            scored(RiskBand::Prime, IncomeBand::Middle, false, 0.10), // boundary -> low bucket
            scored(RiskBand::Prime, IncomeBand::Middle, true, 0.50),
            scored(RiskBand::Prime, IncomeBand::Middle, true, 0.90), // boundary -> high bucket
            scored(RiskBand::Prime, IncomeBand::Middle, true, 0.97),
        ];

        let table = calibration_table(&rows, &thresholds);
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].n, 2);
        assert_eq!(table[1].n, 1);
        assert_eq!(table[2].n, 2);

        assert!(table[0].observed_rate.unwrap().abs() < 1e-12);
        assert!((table[2].observed_rate.unwrap() - 1.0).abs() < 1e-12);
        assert!((table[2].mean_predicted.unwrap() - 0.935).abs() < 1e-12);
    }

    #[test]
    fn calibration_handles_empty_buckets() {
        let thresholds = Thresholds::new(0.9, 0.1).unwrap();
        let table = calibration_table(&[], &thresholds);
        assert!(table.iter().all(|b| b.n == 0 && b.observed_rate.is_none()));
    }
}
