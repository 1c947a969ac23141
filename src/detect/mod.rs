//! Policy-mirror exception detection.
//!
//! The fitted model is a reference point for judging the historical decisions
//! it was trained to reproduce. A record becomes an exception only when the
//! model's confidence and the historical outcome disagree beyond the
//! configured thresholds:
//!
//! 1. `probability >= hi` and history rejected → under-approval exception
//! 2. `probability <= lo` and history approved → over-approval exception
//! 3. otherwise → normal
//!
//! The rules are evaluated in this order, first match wins, and are mutually
//! exclusive by construction (`lo < hi` is enforced at configuration time).
//! Classification is a pure function of `(probability, outcome)` — no hidden
//! state, no ordering dependence — which is also what makes parallel scoring
//! safe.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{
    ExceptionTag, LoanRecord, ScoreWarning, ScoredRecord, SegmentFilter, Thresholds,
};
use crate::model::FittedModel;

/// Classify one scored record.
///
/// Thresholds are inclusive: a probability exactly equal to `hi` (or `lo`)
/// falls inside the exception band.
pub fn classify(probability: f64, approved: bool, thresholds: &Thresholds) -> ExceptionTag {
    if probability >= thresholds.hi() && !approved {
        return ExceptionTag::UnderApproval;
    }
    if probability <= thresholds.lo() && approved {
        return ExceptionTag::OverApproval;
    }
    ExceptionTag::Normal
}

/// Scoring + classification output.
///
/// Records whose prediction failed the buggy-model guard are excluded from
/// `scored` and surfaced as warnings instead of being silently included.
#[derive(Debug, Clone)]
pub struct ScoredSet {
    pub scored: Vec<ScoredRecord>,
    pub warnings: Vec<ScoreWarning>,
}

/// Score every record through the fitted model.
///
/// Rows are independent, so scoring runs in parallel; the output order
/// matches the input order.
pub fn score_records(model: &FittedModel, records: &[LoanRecord]) -> Vec<(LoanRecord, f64)> {
    records
        .par_iter()
        .map(|record| (record.clone(), model.predict_probability(record)))
        .collect()
}

/// Classify scored records, guarding against invalid predictions.
pub fn classify_scored(pairs: Vec<(LoanRecord, f64)>, thresholds: &Thresholds) -> ScoredSet {
    let mut scored = Vec::with_capacity(pairs.len());
    let mut warnings = Vec::new();

    for (record, probability) in pairs {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            warnings.push(ScoreWarning {
                application_id: record.application_id.clone(),
                message: format!("Predicted probability {probability} outside [0, 1]; record excluded."),
            });
            continue;
        }
        let tag = classify(probability, record.approved, thresholds);
        scored.push(ScoredRecord {
            record,
            probability,
            tag,
        });
    }

    ScoredSet { scored, warnings }
}

/// Score and classify the full dataset.
pub fn screen(model: &FittedModel, records: &[LoanRecord], thresholds: &Thresholds) -> ScoredSet {
    classify_scored(score_records(model, records), thresholds)
}

/// Exception counts by tag, within the reported segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionCounts {
    pub normal: usize,
    pub under_approval: usize,
    pub over_approval: usize,
}

impl ExceptionCounts {
    pub fn total(&self) -> usize {
        self.normal + self.under_approval + self.over_approval
    }
}

/// Count tags over the records matching the segment filter.
///
/// The filter restricts which records are reported, never how any record is
/// classified.
pub fn count_exceptions(scored: &[ScoredRecord], segment: &SegmentFilter) -> ExceptionCounts {
    let mut counts = ExceptionCounts::default();
    for s in scored.iter().filter(|s| segment.matches(&s.record)) {
        match s.tag {
            ExceptionTag::Normal => counts.normal += 1,
            ExceptionTag::UnderApproval => counts.under_approval += 1,
            ExceptionTag::OverApproval => counts.over_approval += 1,
        }
    }
    counts
}

/// Bounded review queues (top-N each side).
#[derive(Debug, Clone)]
pub struct ReviewQueues {
    /// Under-approval exceptions, strongest disagreement first (probability descending).
    pub under: Vec<ScoredRecord>,
    /// Over-approval exceptions, strongest disagreement first (probability ascending).
    pub over: Vec<ScoredRecord>,
}

/// Build the bounded review queues over the reported segment.
pub fn build_review_queues(
    scored: &[ScoredRecord],
    segment: &SegmentFilter,
    top_n: usize,
) -> ReviewQueues {
    let mut under: Vec<ScoredRecord> = scored
        .iter()
        .filter(|s| s.tag == ExceptionTag::UnderApproval && segment.matches(&s.record))
        .cloned()
        .collect();
    under.sort_by(|a, b| b.probability.partial_cmp(&a.probability).unwrap_or(std::cmp::Ordering::Equal));
    under.truncate(top_n);

    let mut over: Vec<ScoredRecord> = scored
        .iter()
        .filter(|s| s.tag == ExceptionTag::OverApproval && segment.matches(&s.record))
        .cloned()
        .collect();
    over.sort_by(|a, b| a.probability.partial_cmp(&b.probability).unwrap_or(std::cmp::Ordering::Equal));
    over.truncate(top_n);

    ReviewQueues { under, over }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AmountBand, DurationBand, IncomeBand, LoanBands, RiskBand, DEFAULT_HI_THRESHOLD,
        DEFAULT_LO_THRESHOLD,
    };

    fn thresholds() -> Thresholds {
        Thresholds::new(DEFAULT_HI_THRESHOLD, DEFAULT_LO_THRESHOLD).unwrap()
    }

    fn record(id: &str, risk: RiskBand, approved: bool) -> LoanRecord {
        LoanRecord {
            application_id: id.to_string(),
            credit_score: 700.0,
            annual_income: 50_000.0,
            loan_amount: 10_000.0,
            term_months: 36.0,
            debt_to_income: 0.3,
            payment_to_income: 0.1,
            bands: LoanBands {
                risk,
                income: IncomeBand::Middle,
                amount: AmountBand::Medium,
                duration: DurationBand::Medium,
            },
            approved,
        }
    }

    fn scored(id: &str, risk: RiskBand, approved: bool, probability: f64) -> ScoredRecord {
        let rec = record(id, risk, approved);
        let tag = classify(probability, rec.approved, &thresholds());
        ScoredRecord {
            record: rec,
            probability,
            tag,
        }
    }

    #[test]
    fn exactly_one_tag_for_every_input() {
        // Exhaustive sweep over the probability grid and both outcomes: the
        // classifier is total and the three cases are mutually exclusive.
        let t = thresholds();
        for i in 0..=1000 {
            let p = i as f64 / 1000.0;
            for approved in [true, false] {
                let tag = classify(p, approved, &t);
                let is_under = p >= t.hi() && !approved;
                let is_over = p <= t.lo() && approved;
                match tag {
                    ExceptionTag::UnderApproval => assert!(is_under),
                    ExceptionTag::OverApproval => assert!(is_over),
                    ExceptionTag::Normal => assert!(!is_under && !is_over),
                }
            }
        }
    }

    #[test]
    fn example_scenarios() {
        let t = thresholds();
        assert_eq!(classify(0.95, false, &t), ExceptionTag::UnderApproval);
        assert_eq!(classify(0.03, true, &t), ExceptionTag::OverApproval);
        assert_eq!(classify(0.5, true, &t), ExceptionTag::Normal);
        assert_eq!(classify(0.5, false, &t), ExceptionTag::Normal);
        // Confident agreement is normal, not an exception.
        assert_eq!(classify(0.95, true, &t), ExceptionTag::Normal);
        assert_eq!(classify(0.03, false, &t), ExceptionTag::Normal);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let t = thresholds();
        assert_eq!(classify(0.90, false, &t), ExceptionTag::UnderApproval);
        assert_eq!(classify(0.10, true, &t), ExceptionTag::OverApproval);
        // Just inside the normal band.
        assert_eq!(classify(0.89999, false, &t), ExceptionTag::Normal);
        assert_eq!(classify(0.10001, true, &t), ExceptionTag::Normal);
    }

    #[test]
    fn classification_ignores_everything_but_probability_and_outcome() {
        let t = thresholds();
        for risk in RiskBand::ALL {
            let a = scored("X", risk, false, 0.95);
            assert_eq!(a.tag, ExceptionTag::UnderApproval);
        }
    }

    #[test]
    fn invalid_probability_becomes_warning_not_record() {
        let pairs = vec![
            (record("ok", RiskBand::Prime, true), 0.5),
            (record("bad-nan", RiskBand::Prime, true), f64::NAN),
            (record("bad-range", RiskBand::Prime, false), 1.5),
        ];
        let set = classify_scored(pairs, &thresholds());
        assert_eq!(set.scored.len(), 1);
        assert_eq!(set.scored[0].record.application_id, "ok");
        assert_eq!(set.warnings.len(), 2);
    }

    #[test]
    fn segment_filter_changes_reporting_not_classification() {
        let all = vec![
            scored("u1", RiskBand::Subprime, false, 0.95),
            scored("u2", RiskBand::Prime, false, 0.92),
            scored("o1", RiskBand::Prime, true, 0.04),
            scored("n1", RiskBand::Prime, true, 0.5),
        ];

        let unfiltered = count_exceptions(&all, &SegmentFilter::default());
        assert_eq!(unfiltered.under_approval, 2);
        assert_eq!(unfiltered.over_approval, 1);
        assert_eq!(unfiltered.normal, 1);

        let segment = SegmentFilter {
            risk: Some(RiskBand::Prime),
            income: None,
        };
        let filtered = count_exceptions(&all, &segment);
        assert_eq!(filtered.under_approval, 1);
        assert_eq!(filtered.over_approval, 1);
        assert_eq!(filtered.normal, 1);

        // Tags themselves are identical whether or not a filter is in play.
        for s in &all {
            assert_eq!(s.tag, classify(s.probability, s.record.approved, &thresholds()));
        }
    }

    #[test]
    fn review_queues_are_bounded_and_ordered() {
        let all = vec![
            scored("u1", RiskBand::Prime, false, 0.91),
            scored("u2", RiskBand::Prime, false, 0.99),
            scored("u3", RiskBand::Prime, false, 0.95),
            scored("o1", RiskBand::Prime, true, 0.08),
            scored("o2", RiskBand::Prime, true, 0.01),
            scored("n1", RiskBand::Prime, true, 0.5),
        ];

        let queues = build_review_queues(&all, &SegmentFilter::default(), 2);
        assert_eq!(queues.under.len(), 2);
        assert_eq!(queues.under[0].record.application_id, "u2");
        assert_eq!(queues.under[1].record.application_id, "u3");
        assert_eq!(queues.over.len(), 2);
        assert_eq!(queues.over[0].record.application_id, "o2");
        assert_eq!(queues.over[1].record.application_id, "o1");
    }
}
