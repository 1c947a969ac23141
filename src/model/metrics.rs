//! Held-out evaluation metrics for the approval model.
//!
//! These are diagnostics, not part of the exception-detection contract: they
//! exist so a reader can judge whether the policy mirror is trustworthy
//! before acting on its flags.

use crate::domain::ConfusionMatrix;

/// Confusion matrix at the 0.5 decision point.
///
/// "Positive" is the approved class.
pub fn confusion_at_half(pairs: &[(f64, bool)]) -> ConfusionMatrix {
    let mut cm = ConfusionMatrix::default();
    for &(probability, approved) in pairs {
        let predicted_approve = probability >= 0.5;
        match (predicted_approve, approved) {
            (true, true) => cm.true_pos += 1,
            (true, false) => cm.false_pos += 1,
            (false, false) => cm.true_neg += 1,
            (false, true) => cm.false_neg += 1,
        }
    }
    cm
}

/// Rank-based ROC-AUC (Mann-Whitney U), tie-aware.
///
/// Returns `None` when either class is absent, where AUC is undefined.
pub fn roc_auc(pairs: &[(f64, bool)]) -> Option<f64> {
    let n_pos = pairs.iter().filter(|(_, approved)| *approved).count();
    let n_neg = pairs.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut sorted: Vec<(f64, bool)> = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    // Average ranks across ties so equal scores contribute equally.
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j].0 == sorted[i].0 {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for entry in &sorted[i..j] {
            if entry.1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j;
    }

    let n_pos_f = n_pos as f64;
    let u = rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Some(u / (n_pos_f * n_neg as f64))
}
