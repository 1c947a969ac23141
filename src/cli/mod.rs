//! Command-line parsing for the lending policy mirror.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/detection code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{DEFAULT_HI_THRESHOLD, DEFAULT_LO_THRESHOLD, IncomeBand, RiskBand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pmirror", version, about = "Lending Policy Mirror - historical approval exception screen")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full screen: fit the mirror model, score history, report
    /// exceptions, and optionally export artifacts.
    Run(RunArgs),
    /// Print only the exception counts and review queues (useful for scripting).
    Flags(RunArgs),
    /// Upload a CSV into the staging database and verify the row count.
    Stage(StageArgs),
    /// Generate a synthetic loan-application CSV for demos and smoke runs.
    Sample(SampleArgs),
}

/// Common options for running the screen.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Input CSV of historical loan applications.
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// Upper confidence threshold: under-approval needs probability >= hi.
    #[arg(long, default_value_t = DEFAULT_HI_THRESHOLD)]
    pub hi_threshold: f64,

    /// Lower confidence threshold: over-approval needs probability <= lo.
    #[arg(long, default_value_t = DEFAULT_LO_THRESHOLD)]
    pub lo_threshold: f64,

    /// Random seed for the train/validation split.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fraction of records used for fitting; the rest is held out.
    #[arg(long, default_value_t = 0.8)]
    pub train_frac: f64,

    /// Maximum IRLS iterations for the logistic fit.
    #[arg(long, default_value_t = 25)]
    pub max_iter: usize,

    /// Restrict reporting to one risk band.
    #[arg(long, value_enum)]
    pub risk_band: Option<RiskBand>,

    /// Restrict reporting to one income band.
    #[arg(long, value_enum)]
    pub income_band: Option<IncomeBand>,

    /// Review-queue size per exception type.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the scored table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export run summary (diagnostics + aggregates) to JSON.
    #[arg(long = "export-summary")]
    pub export_summary: Option<PathBuf>,

    /// Stage records through the SQLite database before modeling.
    #[arg(long)]
    pub stage: bool,

    /// Staging database path (defaults to POLICY_MIRROR_DB from the environment).
    #[arg(long)]
    pub stage_db: Option<PathBuf>,
}

/// Options for staging a CSV without running the screen.
#[derive(Debug, Parser)]
pub struct StageArgs {
    /// Input CSV of historical loan applications.
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// Staging database path (defaults to POLICY_MIRROR_DB from the environment).
    #[arg(long)]
    pub db: Option<PathBuf>,
}

/// Options for generating a synthetic sample.
#[derive(Debug, Parser)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(value_name = "CSV")]
    pub out: PathBuf,

    /// Number of applications to generate.
    #[arg(short = 'n', long, default_value_t = 5000)]
    pub count: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fraction of decisions flipped to simulate historical overrides.
    #[arg(long, default_value_t = 0.04)]
    pub override_rate: f64,
}
