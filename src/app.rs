//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - validates run configuration (thresholds first, before any data work)
//! - runs the screen pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, RunArgs, SampleArgs, StageArgs};
use crate::domain::{RunConfig, SegmentFilter, Thresholds};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `pmirror` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args, OutputMode::Full),
        Command::Flags(args) => handle_run(args, OutputMode::FlagsOnly),
        Command::Stage(args) => handle_stage(args),
        Command::Sample(args) => handle_sample(args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    FlagsOnly,
}

fn handle_run(args: RunArgs, mode: OutputMode) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let run = pipeline::run_screen(&config)?;

    if mode == OutputMode::Full {
        println!(
            "{}",
            crate::report::format::format_run_summary(&run.ingest, &run.fit, &config)
        );
    }

    println!(
        "{}",
        crate::report::format::format_exception_report(&run.counts, &run.queues)
    );

    if mode == OutputMode::Full {
        println!("{}", crate::report::format::format_heatmap(&run.heatmap));
        println!("{}", crate::report::format::format_calibration(&run.calibration));

        for warning in &run.scored.warnings {
            eprintln!(
                "warning: [{}] {}",
                warning.application_id, warning.message
            );
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_scored {
        crate::io::export::write_scored_csv(path, &run.scored.scored)?;
    }
    if let Some(path) = &config.export_summary {
        let summary = crate::io::summary::build_summary(
            &config.thresholds,
            &config.segment,
            &run.fit.model,
            &run.fit.diagnostics,
            run.counts,
            run.heatmap.clone(),
            run.calibration.clone(),
            run.ingest.rows_used,
            run.ingest.row_errors.len(),
            run.scored.warnings.len(),
        );
        crate::io::summary::write_summary_json(path, &summary)?;
    }

    Ok(())
}

fn handle_stage(args: StageArgs) -> Result<(), AppError> {
    let db_path = crate::stage::resolve_db_path(args.db)?;
    let ingest = crate::io::ingest::load_records(&args.csv)?;
    let report = crate::stage::stage_records(&db_path, &ingest.records)?;

    println!(
        "Staged {} records into '{}' (row counts match).",
        report.staged,
        db_path.display()
    );
    if !ingest.row_errors.is_empty() {
        println!("Skipped {} invalid rows during ingest.", ingest.row_errors.len());
    }
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = crate::data::SampleConfig {
        count: args.count,
        seed: args.seed,
        override_rate: args.override_rate,
    };
    let rows = crate::data::generate_sample(&config)?;
    crate::data::write_sample_csv(&args.out, &rows)?;

    let approved = rows.iter().filter(|r| r.approved).count();
    println!(
        "Wrote {} applications to '{}' ({} approved, {} rejected).",
        rows.len(),
        args.out.display(),
        approved,
        rows.len() - approved,
    );
    Ok(())
}

/// Build and validate the run configuration.
///
/// Threshold validation happens here, before any scoring or even data
/// loading: an invalid configuration must never produce partial output.
pub fn run_config_from_args(args: &RunArgs) -> Result<RunConfig, AppError> {
    let thresholds = Thresholds::new(args.hi_threshold, args.lo_threshold)?;

    let stage_db = if args.stage || args.stage_db.is_some() {
        Some(crate::stage::resolve_db_path(args.stage_db.clone())?)
    } else {
        None
    };

    Ok(RunConfig {
        csv_path: args.csv.clone(),
        thresholds,
        seed: args.seed,
        train_frac: args.train_frac,
        max_iter: args.max_iter,
        segment: SegmentFilter {
            risk: args.risk_band,
            income: args.income_band,
        },
        top_n: args.top,
        export_scored: args.export.clone(),
        export_summary: args.export_summary.clone(),
        stage_db,
    })
}
