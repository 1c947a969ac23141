//! Shared "screen pipeline" logic used by the CLI front-end.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> (optional staging round-trip) -> fit -> score -> classify -> aggregate
//!
//! The CLI can then focus on presentation (printing vs exporting).

use crate::detect::{self, ExceptionCounts, ReviewQueues, ScoredSet};
use crate::domain::RunConfig;
use crate::error::AppError;
use crate::io::ingest::{self, IngestedData};
use crate::model::{FitSummary, fit_model};
use crate::report::aggregate::{ApprovalHeatmap, CalibrationBucket, build_heatmap, calibration_table};
use crate::stage;

/// All computed outputs of a single screen run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub fit: FitSummary,
    pub scored: ScoredSet,
    pub counts: ExceptionCounts,
    pub queues: ReviewQueues,
    pub heatmap: ApprovalHeatmap,
    pub calibration: Vec<CalibrationBucket>,
}

/// Execute the full screen pipeline and return the computed outputs.
///
/// Configuration is validated before any data is touched (the thresholds are
/// already a validated type by the time a `RunConfig` exists), and every
/// stage either succeeds completely or aborts the run.
pub fn run_screen(config: &RunConfig) -> Result<RunOutput, AppError> {
    // 1) Load and normalize the CSV.
    let mut ingest = ingest::load_records(&config.csv_path)?;

    // 2) Optional staging round-trip: upload, verify, read back the enriched
    //    table. The rest of the pipeline cannot tell which path produced the
    //    records.
    if let Some(db_path) = &config.stage_db {
        stage::stage_records(db_path, &ingest.records)?;
        let staged = stage::load_staged(db_path)?;
        ingest.replace_records(staged)?;
    }

    // 3) Fit the mirror model on a seeded split.
    let fit = fit_model(&ingest.records, config.seed, config.train_frac, config.max_iter)?;

    // 4) Score every record and classify disagreements.
    let scored = detect::screen(&fit.model, &ingest.records, &config.thresholds);

    // 5) Aggregate reporting views over the configured segment.
    let counts = detect::count_exceptions(&scored.scored, &config.segment);
    let queues = detect::build_review_queues(&scored.scored, &config.segment, config.top_n);
    let heatmap = build_heatmap(&scored.scored, &config.segment);
    let calibration = calibration_table(&scored.scored, &config.thresholds);

    Ok(RunOutput {
        ingest,
        fit,
        scored,
        counts,
        queues,
        heatmap,
        calibration,
    })
}
