//! Optional relational staging store (SQLite).
//!
//! Staging mirrors the upstream workflow: upload the normalized records plus
//! their derived band columns into a `loan_applications` table, verify the
//! staged row count against the upload, and let the run read the enriched
//! table back instead of re-deriving bands in-process. The model and the
//! detector never know which path produced their records.
//!
//! Access is single-writer (one upload), single-reader (one query) per run;
//! each upload replaces the previous table wholesale.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};

use crate::domain::{
    AmountBand, DurationBand, IncomeBand, LoanBands, LoanRecord, RiskBand,
};
use crate::error::AppError;

/// Environment variable holding the default staging database path.
pub const DB_ENV_VAR: &str = "POLICY_MIRROR_DB";

const TABLE: &str = "loan_applications";

/// Result of one staging upload.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub staged: usize,
}

/// Resolve the staging database path from an explicit flag or the
/// environment (`.env` supported).
pub fn resolve_db_path(explicit: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    dotenvy::dotenv().ok();
    std::env::var(DB_ENV_VAR)
        .map(PathBuf::from)
        .map_err(|_| {
            AppError::new(
                2,
                format!("No staging database given: pass --db or set {DB_ENV_VAR} in the environment (.env)."),
            )
        })
}

/// Upload records (with derived bands) into the staging table, replacing any
/// previous contents, then verify the staged row count.
pub fn stage_records(db_path: &Path, records: &[LoanRecord]) -> Result<StageReport, AppError> {
    if records.is_empty() {
        return Err(AppError::new(3, "No records to stage."));
    }

    let mut conn = open(db_path)?;

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {TABLE};
         CREATE TABLE {TABLE} (
             application_id    TEXT NOT NULL,
             credit_score      REAL NOT NULL,
             annual_income     REAL NOT NULL,
             loan_amount       REAL NOT NULL,
             term_months       REAL NOT NULL,
             debt_to_income    REAL NOT NULL,
             payment_to_income REAL NOT NULL,
             risk_band         TEXT NOT NULL,
             income_band       TEXT NOT NULL,
             amount_band       TEXT NOT NULL,
             duration_band     TEXT NOT NULL,
             approved          INTEGER NOT NULL
         );"
    ))
    .map_err(|e| AppError::new(2, format!("Failed to create staging table: {e}")))?;

    let tx = conn
        .transaction()
        .map_err(|e| AppError::new(2, format!("Failed to open staging transaction: {e}")))?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {TABLE} VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))
            .map_err(|e| AppError::new(2, format!("Failed to prepare staging insert: {e}")))?;
        for r in records {
            stmt.execute(params![
                r.application_id,
                r.credit_score,
                r.annual_income,
                r.loan_amount,
                r.term_months,
                r.debt_to_income,
                r.payment_to_income,
                r.bands.risk.display_name(),
                r.bands.income.display_name(),
                r.bands.amount.display_name(),
                r.bands.duration.display_name(),
                r.approved as i64,
            ])
            .map_err(|e| AppError::new(2, format!("Failed to stage record '{}': {e}", r.application_id)))?;
        }
    }
    tx.commit()
        .map_err(|e| AppError::new(2, format!("Failed to commit staging upload: {e}")))?;

    // Verify the staged row count matches what we uploaded.
    let staged: usize = conn
        .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get::<_, i64>(0))
        .map(|n| n as usize)
        .map_err(|e| AppError::new(2, format!("Failed to count staged rows: {e}")))?;

    if staged != records.len() {
        return Err(AppError::new(
            3,
            format!(
                "Staging verification failed: uploaded {} rows but the table holds {staged}.",
                records.len()
            ),
        ));
    }

    Ok(StageReport { staged })
}

/// Read the enriched table back, taking the band columns as supplied.
pub fn load_staged(db_path: &Path) -> Result<Vec<LoanRecord>, AppError> {
    let conn = open(db_path)?;

    let mut stmt = conn
        .prepare(&format!(
            "SELECT application_id, credit_score, annual_income, loan_amount, term_months,
                    debt_to_income, payment_to_income, risk_band, income_band, amount_band,
                    duration_band, approved
             FROM {TABLE} ORDER BY rowid"
        ))
        .map_err(|e| AppError::new(2, format!("Failed to query staging table: {e}")))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, i64>(11)?,
            ))
        })
        .map_err(|e| AppError::new(2, format!("Failed to read staging table: {e}")))?;

    let mut records = Vec::new();
    for row in rows {
        let (
            application_id,
            credit_score,
            annual_income,
            loan_amount,
            term_months,
            debt_to_income,
            payment_to_income,
            risk_name,
            income_name,
            amount_name,
            duration_name,
            approved,
        ) = row.map_err(|e| AppError::new(2, format!("Failed to read staged row: {e}")))?;

        let bands = LoanBands {
            risk: RiskBand::from_name(&risk_name)
                .ok_or_else(|| AppError::new(3, format!("Unknown staged risk band '{risk_name}'.")))?,
            income: IncomeBand::from_name(&income_name)
                .ok_or_else(|| AppError::new(3, format!("Unknown staged income band '{income_name}'.")))?,
            amount: AmountBand::from_name(&amount_name)
                .ok_or_else(|| AppError::new(3, format!("Unknown staged amount band '{amount_name}'.")))?,
            duration: DurationBand::from_name(&duration_name)
                .ok_or_else(|| AppError::new(3, format!("Unknown staged duration band '{duration_name}'.")))?,
        };

        records.push(LoanRecord {
            application_id,
            credit_score,
            annual_income,
            loan_amount,
            term_months,
            debt_to_income,
            payment_to_income,
            bands,
            approved: approved != 0,
        });
    }

    if records.is_empty() {
        return Err(AppError::new(3, "Staging table is empty."));
    }

    Ok(records)
}

fn open(db_path: &Path) -> Result<Connection, AppError> {
    Connection::open(db_path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open staging database '{}': {e}", db_path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, approved: bool) -> LoanRecord {
        LoanRecord {
            application_id: id.to_string(),
            credit_score: 702.0,
            annual_income: 52_000.0,
            loan_amount: 12_000.0,
            term_months: 36.0,
            debt_to_income: 0.31,
            payment_to_income: 0.12,
            bands: LoanBands {
                risk: RiskBand::Prime,
                income: IncomeBand::Middle,
                amount: AmountBand::Medium,
                duration: DurationBand::Medium,
            },
            approved,
        }
    }

    fn temp_db(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pmirror-stage-{}-{name}.db", std::process::id()))
    }

    #[test]
    fn staging_round_trips_records_and_bands() {
        let path = temp_db("roundtrip");
        let records = vec![record("A-1", true), record("A-2", false)];

        let report = stage_records(&path, &records).unwrap();
        assert_eq!(report.staged, 2);

        let loaded = load_staged(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].application_id, "A-1");
        assert!(loaded[0].approved);
        assert!(!loaded[1].approved);
        assert_eq!(loaded[0].bands.risk, RiskBand::Prime);
        assert_eq!(loaded[1].bands.income, IncomeBand::Middle);
    }

    #[test]
    fn restaging_replaces_previous_contents() {
        let path = temp_db("replace");
        stage_records(&path, &[record("A-1", true), record("A-2", true)]).unwrap();
        stage_records(&path, &[record("B-1", false)]).unwrap();

        let loaded = load_staged(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].application_id, "B-1");
    }

    #[test]
    fn corrupt_band_column_is_rejected() {
        let path = temp_db("corrupt");
        stage_records(&path, &[record("A-1", true)]).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute("UPDATE loan_applications SET risk_band = 'mystery'", [])
            .unwrap();
        drop(conn);

        let err = load_staged(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn staging_nothing_is_an_error() {
        let path = temp_db("empty");
        let err = stage_records(&path, &[]).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), 3);
    }
}
