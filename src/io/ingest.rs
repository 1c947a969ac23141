//! CSV ingest and normalization.
//!
//! This module is responsible for turning a loan-application CSV into a clean
//! set of normalized records that are safe to fit and score.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2,
//!   listing every missing column at once)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no modeling logic here
//!
//! Out-of-domain values (negative income, non-positive term, non-finite
//! ratios) reject the row with a recorded error; there is no silent default
//! band.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{
    AmountBand, DurationBand, IncomeBand, LoanBands, LoanRecord, LoanRow, RiskBand,
};
use crate::error::AppError;

/// Columns every input file must carry, in documented order.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "application_id",
    "credit_score",
    "annual_income",
    "loan_amount",
    "term_months",
    "debt_to_income",
    "payment_to_income",
    "approved",
];

/// Summary stats about the records actually used for the run.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_records: usize,
    pub n_approved: usize,
    pub score_min: f64,
    pub score_max: f64,
    pub income_min: f64,
    pub income_max: f64,
}

impl DatasetStats {
    pub fn approval_rate(&self) -> f64 {
        if self.n_records == 0 {
            return 0.0;
        }
        self.n_approved as f64 / self.n_records as f64
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: normalized records + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub records: Vec<LoanRecord>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl IngestedData {
    /// Swap in records that already carry bands (e.g., read back from the
    /// staging store), keeping the original row-error bookkeeping.
    pub fn replace_records(&mut self, records: Vec<LoanRecord>) -> Result<(), AppError> {
        self.stats = compute_stats(&records)
            .ok_or_else(|| AppError::new(3, "No records available for the run."))?;
        self.rows_used = records.len();
        self.records = records;
        Ok(())
    }
}

/// Load and normalize a loan-application CSV.
pub fn load_records(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(row) => match normalize_row(&row) {
                Ok(normalized) => records.push(normalized),
                Err(e) => row_errors.push(RowError {
                    line,
                    id: Some(row.application_id),
                    message: e,
                }),
            },
            Err(e) => row_errors.push(RowError {
                line,
                id: None,
                message: e,
            }),
        }
    }

    let rows_used = records.len();
    if rows_used == 0 {
        return Err(AppError::new(
            3,
            "No valid rows remain after normalization.",
        ));
    }

    let stats = compute_stats(&records)
        .ok_or_else(|| AppError::new(3, "No valid records remain after normalization."))?;

    Ok(IngestedData {
        records,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header (e.g. "﻿application_id"). If we don't strip it, schema
    // validation will incorrectly report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| !header_map.contains_key(*name))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::new(
        2,
        format!("Missing required column(s): {}", missing.join(", ")),
    ))
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<LoanRow, String> {
    let application_id = get_required(record, header_map, "application_id")?.to_string();

    let credit_score = parse_f64(get_required(record, header_map, "credit_score")?, "credit_score")?;
    let annual_income = parse_f64(get_required(record, header_map, "annual_income")?, "annual_income")?;
    let loan_amount = parse_f64(get_required(record, header_map, "loan_amount")?, "loan_amount")?;
    let term_months = parse_f64(get_required(record, header_map, "term_months")?, "term_months")?;
    let debt_to_income = parse_f64(get_required(record, header_map, "debt_to_income")?, "debt_to_income")?;
    let payment_to_income = parse_f64(
        get_required(record, header_map, "payment_to_income")?,
        "payment_to_income",
    )?;
    let approved = parse_outcome(get_required(record, header_map, "approved")?)?;

    Ok(LoanRow {
        application_id,
        credit_score,
        annual_income,
        loan_amount,
        term_months,
        debt_to_income,
        payment_to_income,
        approved,
    })
}

fn normalize_row(row: &LoanRow) -> Result<LoanRecord, String> {
    if row.term_months <= 0.0 {
        return Err(format!("Non-positive `term_months` value ({}).", row.term_months));
    }
    if row.loan_amount <= 0.0 {
        return Err(format!("Non-positive `loan_amount` value ({}).", row.loan_amount));
    }
    if row.debt_to_income < 0.0 {
        return Err(format!("Negative `debt_to_income` value ({}).", row.debt_to_income));
    }
    if row.payment_to_income < 0.0 {
        return Err(format!(
            "Negative `payment_to_income` value ({}).",
            row.payment_to_income
        ));
    }

    let bands = LoanBands {
        risk: RiskBand::from_score(row.credit_score)?,
        income: IncomeBand::from_income(row.annual_income)?,
        amount: AmountBand::from_amount(row.loan_amount)?,
        duration: DurationBand::from_term_months(row.term_months)?,
    };

    Ok(LoanRecord {
        application_id: row.application_id.clone(),
        credit_score: row.credit_score,
        annual_income: row.annual_income,
        loan_amount: row.loan_amount,
        term_months: row.term_months,
        debt_to_income: row.debt_to_income,
        payment_to_income: row.payment_to_income,
        bands,
        approved: row.approved,
    })
}

fn compute_stats(records: &[LoanRecord]) -> Option<DatasetStats> {
    if records.is_empty() {
        return None;
    }

    let mut score_min = f64::INFINITY;
    let mut score_max = f64::NEG_INFINITY;
    let mut income_min = f64::INFINITY;
    let mut income_max = f64::NEG_INFINITY;
    let mut n_approved = 0usize;

    for r in records {
        score_min = score_min.min(r.credit_score);
        score_max = score_max.max(r.credit_score);
        income_min = income_min.min(r.annual_income);
        income_max = income_max.max(r.annual_income);
        if r.approved {
            n_approved += 1;
        }
    }

    if !(score_min.is_finite() && score_max.is_finite() && income_min.is_finite() && income_max.is_finite()) {
        return None;
    }

    Some(DatasetStats {
        n_records: records.len(),
        n_approved,
        score_min,
        score_max,
        income_min,
        income_max,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid numeric `{name}` value '{s}'."))?;
    if !v.is_finite() {
        return Err(format!("Non-finite `{name}` value '{s}'."));
    }
    Ok(v)
}

fn parse_outcome(s: &str) -> Result<bool, String> {
    // Historical exports are inconsistent about how they spell the outcome;
    // accept the common encodings but nothing fuzzier.
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "approved" | "approve" => Ok(true),
        "0" | "false" | "no" | "n" | "rejected" | "reject" | "denied" => Ok(false),
        other => Err(format!("Invalid `approved` value '{other}'.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("pmirror-ingest-{}-{name}.csv", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const HEADER: &str = "application_id,credit_score,annual_income,loan_amount,term_months,debt_to_income,payment_to_income,approved\n";

    #[test]
    fn loads_well_formed_rows() {
        let path = write_csv(
            "ok",
            &format!(
                "{HEADER}A-1,702,52000,12000,36,0.31,0.12,1\nA-2,551,24000,4000,18,0.55,0.2,rejected\n"
            ),
        );
        let data = load_records(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(data.rows_read, 2);
        assert_eq!(data.rows_used, 2);
        assert!(data.row_errors.is_empty());
        assert_eq!(data.stats.n_approved, 1);
        assert_eq!(data.records[0].bands.risk, RiskBand::Prime);
        assert_eq!(data.records[1].bands.risk, RiskBand::Subprime);
        assert!(!data.records[1].approved);
    }

    #[test]
    fn missing_columns_are_all_listed() {
        let path = write_csv("missing", "application_id,credit_score,approved\nA-1,700,1\n");
        let err = load_records(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert_eq!(err.exit_code(), 2);
        let message = err.to_string();
        for column in [
            "annual_income",
            "loan_amount",
            "term_months",
            "debt_to_income",
            "payment_to_income",
        ] {
            assert!(message.contains(column), "missing `{column}` in: {message}");
        }
    }

    #[test]
    fn out_of_domain_rows_become_row_errors() {
        let path = write_csv(
            "domain",
            &format!(
                "{HEADER}\
                 A-1,700,52000,12000,36,0.31,0.12,1\n\
                 A-2,700,-100,12000,36,0.31,0.12,1\n\
                 A-3,700,52000,12000,0,0.31,0.12,0\n\
                 A-4,700,52000,12000,36,0.31,0.12,maybe\n"
            ),
        );
        let data = load_records(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(data.rows_read, 4);
        assert_eq!(data.rows_used, 1);
        assert_eq!(data.row_errors.len(), 3);
        assert_eq!(data.row_errors[0].id.as_deref(), Some("A-2"));
        assert!(data.row_errors[0].message.contains("annual_income"));
        assert!(data.row_errors[1].message.contains("term_months"));
        assert!(data.row_errors[2].message.contains("approved"));
    }

    #[test]
    fn all_rows_invalid_is_fatal() {
        let path = write_csv("empty", &format!("{HEADER}A-1,700,-1,12000,36,0.3,0.1,1\n"));
        let err = load_records(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn bom_header_is_tolerated() {
        let path = write_csv(
            "bom",
            &format!("\u{feff}{HEADER}A-1,700,52000,12000,36,0.31,0.12,1\n"),
        );
        let data = load_records(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(data.rows_used, 1);
    }
}
