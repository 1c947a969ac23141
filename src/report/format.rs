//! Formatted terminal output for the run.

use crate::detect::{ExceptionCounts, ReviewQueues};
use crate::domain::{RunConfig, ScoredRecord};
use crate::io::ingest::IngestedData;
use crate::model::FitSummary;
use crate::report::aggregate::{ApprovalHeatmap, CalibrationBucket};

/// Maximum number of row errors echoed into the terminal summary.
const MAX_ROW_ERRORS_SHOWN: usize = 5;

/// Format the full run summary (dataset stats + fit diagnostics).
pub fn format_run_summary(ingest: &IngestedData, fit: &FitSummary, config: &RunConfig) -> String {
    let mut out = String::new();

    out.push_str("=== pmirror - Lending Policy Mirror ===\n");
    out.push_str(&format!("Input: {}\n", config.csv_path.display()));
    out.push_str(&format!(
        "Records: n={} (read={}, skipped={}) | approval rate={:.1}%\n",
        ingest.rows_used,
        ingest.rows_read,
        ingest.row_errors.len(),
        ingest.stats.approval_rate() * 100.0,
    ));
    out.push_str(&format!(
        "Score range: [{:.0}, {:.0}] | income range: [{:.0}, {:.0}]\n",
        ingest.stats.score_min, ingest.stats.score_max, ingest.stats.income_min, ingest.stats.income_max,
    ));
    out.push_str(&format!(
        "Thresholds: hi={:.2} lo={:.2} | seed={} | train-frac={:.2}\n",
        config.thresholds.hi(),
        config.thresholds.lo(),
        config.seed,
        config.train_frac,
    ));
    if let Some(risk) = config.segment.risk {
        out.push_str(&format!("Segment: risk band = {}\n", risk.display_name()));
    }
    if let Some(income) = config.segment.income {
        out.push_str(&format!("Segment: income band = {}\n", income.display_name()));
    }

    if !ingest.row_errors.is_empty() {
        out.push_str(&format!("\nRow warnings ({} total):\n", ingest.row_errors.len()));
        for err in ingest.row_errors.iter().take(MAX_ROW_ERRORS_SHOWN) {
            let id = err.id.as_deref().unwrap_or("?");
            out.push_str(&format!("  line {:>5} [{}] {}\n", err.line, id, err.message));
        }
        if ingest.row_errors.len() > MAX_ROW_ERRORS_SHOWN {
            out.push_str(&format!(
                "  ... and {} more\n",
                ingest.row_errors.len() - MAX_ROW_ERRORS_SHOWN
            ));
        }
    }

    let d = &fit.diagnostics;
    out.push_str("\nModel diagnostics (held-out split):\n");
    out.push_str(&format!(
        "- split: train={} valid={} | IRLS iters={}{}\n",
        d.n_train,
        d.n_valid,
        fit.n_iter,
        if fit.converged { "" } else { " (not converged)" },
    ));
    out.push_str(&format!(
        "- accuracy: {} | ROC-AUC: {}\n",
        fmt_opt_pct(d.accuracy),
        fmt_opt(d.auc),
    ));
    let cm = &d.confusion;
    out.push_str(&format!(
        "- confusion: TP={} FP={} TN={} FN={}\n",
        cm.true_pos, cm.false_pos, cm.true_neg, cm.false_neg
    ));
    out.push_str(&format!(
        "- approved: precision={} recall={} | rejected: precision={} recall={}\n",
        fmt_opt_pct(cm.precision_approved()),
        fmt_opt_pct(cm.recall_approved()),
        fmt_opt_pct(cm.precision_rejected()),
        fmt_opt_pct(cm.recall_rejected()),
    ));
    out.push('\n');

    out
}

/// Format exception counts and the bounded review queues.
pub fn format_exception_report(counts: &ExceptionCounts, queues: &ReviewQueues) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Exceptions: normal={} under-approval={} over-approval={} (reported={})\n\n",
        counts.normal,
        counts.under_approval,
        counts.over_approval,
        counts.total(),
    ));

    out.push_str("Under-approval review queue (model confident approve, history rejected):\n");
    out.push_str(&format_queue_table(&queues.under));
    out.push('\n');

    out.push_str("Over-approval review queue (model confident reject, history approved):\n");
    out.push_str(&format_queue_table(&queues.over));

    out
}

fn format_queue_table(rows: &[ScoredRecord]) -> String {
    if rows.is_empty() {
        return "  (none)\n".to_string();
    }

    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>8} {:>12} {:>10} {:>12} {:<12} {:<8}\n",
            "application_id", "score", "income", "amount", "probability", "risk", "hist"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<20} {:-<8} {:-<12} {:-<10} {:-<12} {:-<12} {:-<8}\n",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for s in rows {
        let r = &s.record;
        out.push_str(
            format!(
                "{:<20} {:>8.0} {:>12.0} {:>10.0} {:>12.4} {:<12} {:<8}\n",
                truncate(&r.application_id, 20),
                r.credit_score,
                r.annual_income,
                r.loan_amount,
                s.probability,
                r.bands.risk.display_name(),
                if r.approved { "approve" } else { "reject" },
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Format the approval-rate heatmap as a text matrix.
pub fn format_heatmap(heatmap: &ApprovalHeatmap) -> String {
    let mut out = String::new();
    out.push_str("Approval rate by risk band x income band:\n");

    out.push_str(&format!("{:<14}", ""));
    for income in &heatmap.income_bands {
        out.push_str(&format!("{:>16}", income));
    }
    out.push('\n');

    for (row, risk) in heatmap.risk_bands.iter().enumerate() {
        out.push_str(&format!("{:<14}", risk));
        for cell in &heatmap.cells[row] {
            let text = match cell.approval_rate {
                Some(rate) => format!("{:.0}% (n={})", rate * 100.0, cell.n),
                None => "-".to_string(),
            };
            out.push_str(&format!("{:>16}", text));
        }
        out.push('\n');
    }

    out
}

/// Format the calibration table.
pub fn format_calibration(table: &[CalibrationBucket]) -> String {
    let mut out = String::new();
    out.push_str("Calibration (predicted confidence vs observed approval rate):\n");
    out.push_str(
        format!(
            "{:<22} {:>8} {:>16} {:>16}\n",
            "bucket", "n", "mean predicted", "observed rate"
        )
        .trim_end(),
    );
    out.push('\n');

    for bucket in table {
        out.push_str(
            format!(
                "{:<22} {:>8} {:>16} {:>16}\n",
                bucket.label,
                bucket.n,
                fmt_opt_pct(bucket.mean_predicted),
                fmt_opt_pct(bucket.observed_rate),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.4}"),
        None => "n/a".to_string(),
    }
}

fn fmt_opt_pct(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
