//! Reconciliation service: compare extracted invoices against the statement.
//!
//! DESIGN
//! ======
//! Both inputs are reduced to keyed views (invoice ID → total). Rows with
//! placeholder IDs are left out of the views; an ID that appears twice keeps
//! its first row. Every ID then lands in exactly one bucket:
//!
//! ```text
//! Missing       on the statement, never extracted
//! Extra         extracted, not on the statement
//! Discrepancy   on both, totals differ by more than the tolerance
//! Matched       on both, totals agree
//! ```
//!
//! The output is written in that bucket order and closed with a `SUMMARY`
//! row whose totals cover every input row, keyed or not.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::money::{amounts_match, format_money, parse_amount};
use crate::services::csv_io;
use crate::services::extraction::{self, ERROR_MARKER, ExtractedInvoice, ExtractionError};
use crate::services::statement::{self, Statement, StatementError, is_placeholder_id};
use crate::services::storage::{RESULTS_BASE, Storage, StorageError};

pub const SUMMARY_ID: &str = "SUMMARY";

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("No extracted invoice data found")]
    NoExtraction,
    #[error("No reconciliation results found")]
    NoResults,
    #[error(transparent)]
    Statement(#[from] StatementError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("reconciliation CSV is malformed: {0}")]
    Csv(#[from] csv::Error),
}

impl ErrorCode for ReconcileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoExtraction => "E_NO_EXTRACTION",
            Self::NoResults => "E_NO_RESULTS",
            Self::Statement(e) => e.error_code(),
            Self::Extraction(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Csv(_) => "E_RESULTS_CSV",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NoExtraction | Self::NoResults => StatusCode::NOT_FOUND,
            Self::Statement(e) => e.status(),
            Self::Extraction(e) => e.status(),
            Self::Storage(e) => e.status(),
            Self::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Missing,
    Extra,
    Discrepancy,
    Matched,
    Totals,
}

/// One row of a reconciliation output file. Amounts are pre-rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    #[serde(rename = "Invoice ID")]
    pub invoice_id: String,
    #[serde(rename = "Status")]
    pub status: Status,
    #[serde(rename = "Expected Total")]
    pub expected_total: String,
    #[serde(rename = "Extracted Total")]
    pub extracted_total: String,
    #[serde(rename = "Difference")]
    pub difference: String,
}

impl csv_io::CsvRow for ReconciliationRow {
    const HEADER: &'static [&'static str] =
        &["Invoice ID", "Status", "Expected Total", "Extracted Total", "Difference"];
}

impl ReconciliationRow {
    fn new(invoice_id: &str, status: Status, expected: f64, extracted: f64, difference: f64) -> Self {
        Self {
            invoice_id: invoice_id.to_string(),
            status,
            expected_total: format_money(expected),
            extracted_total: format_money(extracted),
            difference: format_money(difference),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReconcileSummary {
    pub matched: usize,
    pub missing: usize,
    pub extra: usize,
    pub discrepancies: usize,
    pub expected_total: f64,
    pub extracted_total: f64,
    pub difference: f64,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub rows: Vec<ReconciliationRow>,
    pub summary: ReconcileSummary,
}

/// A reconciliation written to disk.
#[derive(Debug, Clone)]
pub struct ReconcileRun {
    pub path: PathBuf,
    pub reconciliation: Reconciliation,
}

/// Ordered ID → amount view that keeps the first row per ID.
struct Keyed<'a> {
    order: Vec<&'a str>,
    amounts: HashMap<&'a str, f64>,
}

impl<'a> Keyed<'a> {
    fn build(side: &str, rows: impl Iterator<Item = (&'a str, f64)>) -> Self {
        let mut order = Vec::new();
        let mut amounts = HashMap::new();
        for (id, amount) in rows {
            if amounts.contains_key(id) {
                warn!(side, invoice_id = id, "duplicate invoice id; keeping the first row");
                continue;
            }
            amounts.insert(id, amount);
            order.push(id);
        }
        Self { order, amounts }
    }

    fn get(&self, id: &str) -> Option<f64> {
        self.amounts.get(id).copied()
    }
}

/// Reconcile extracted invoices against a statement.
#[must_use]
pub fn reconcile(invoices: &[ExtractedInvoice], statement: &Statement) -> Reconciliation {
    let expected = Keyed::build(
        "statement",
        statement
            .valid_lines()
            .map(|l| (l.invoice_id.as_str(), l.expected_total)),
    );
    let extracted = Keyed::build(
        "extracted",
        invoices
            .iter()
            .map(|i| (i.invoice_id.trim(), parse_amount(&i.total_amount)))
            .filter(|(id, _)| !is_placeholder_id(id) && *id != ERROR_MARKER),
    );

    let mut missing = Vec::new();
    let mut discrepancies = Vec::new();
    let mut matched = Vec::new();
    for &id in &expected.order {
        let want = expected.get(id).unwrap_or_default();
        match extracted.get(id) {
            None => missing.push(ReconciliationRow::new(id, Status::Missing, want, 0.0, -want)),
            Some(got) if amounts_match(want, got) => {
                matched.push(ReconciliationRow::new(id, Status::Matched, want, got, 0.0));
            }
            Some(got) => {
                discrepancies.push(ReconciliationRow::new(id, Status::Discrepancy, want, got, got - want));
            }
        }
    }

    let on_statement: HashSet<&str> = expected.order.iter().copied().collect();
    let extra: Vec<ReconciliationRow> = extracted
        .order
        .iter()
        .filter(|id| !on_statement.contains(*id))
        .map(|&id| {
            let got = extracted.get(id).unwrap_or_default();
            ReconciliationRow::new(id, Status::Extra, 0.0, got, got)
        })
        .collect();

    let expected_total: f64 = statement.lines.iter().map(|l| l.expected_total).sum();
    let extracted_total: f64 = invoices.iter().map(|i| parse_amount(&i.total_amount)).sum();
    let summary = ReconcileSummary {
        matched: matched.len(),
        missing: missing.len(),
        extra: extra.len(),
        discrepancies: discrepancies.len(),
        expected_total,
        extracted_total,
        difference: extracted_total - expected_total,
    };

    let mut rows = Vec::with_capacity(missing.len() + extra.len() + discrepancies.len() + matched.len() + 1);
    rows.extend(missing);
    rows.extend(extra);
    rows.extend(discrepancies);
    rows.extend(matched);
    rows.push(ReconciliationRow::new(
        SUMMARY_ID,
        Status::Totals,
        expected_total,
        extracted_total,
        summary.difference,
    ));

    Reconciliation { rows, summary }
}

/// Reconcile the latest extraction against the stored statement and write
/// the next results file.
///
/// # Errors
///
/// Returns [`ReconcileError::NoExtraction`] or a missing-statement error
/// when an input is absent, or an error if reading or writing fails.
pub async fn run_reconciliation(storage: &Storage) -> Result<ReconcileRun, ReconcileError> {
    let (source, invoices) = extraction::load_latest(storage).await?.ok_or(ReconcileError::NoExtraction)?;
    let statement = statement::load_statement(storage).await?;

    let reconciliation = reconcile(&invoices, &statement);
    let bytes = csv_io::write_rows(&reconciliation.rows)?;
    let path = storage.write_next(&storage.results_dir(), RESULTS_BASE, &bytes).await?;

    let s = &reconciliation.summary;
    info!(
        source = %source.display(),
        path = %path.display(),
        statement_totals = statement.has_totals,
        matched = s.matched,
        missing = s.missing,
        extra = s.extra,
        discrepancies = s.discrepancies,
        difference = %format_money(s.difference),
        "reconciliation written"
    );
    Ok(ReconcileRun { path, reconciliation })
}

/// Path of the newest results file.
///
/// # Errors
///
/// Returns [`ReconcileError::NoResults`] when no reconciliation has run.
pub async fn latest_results_file(storage: &Storage) -> Result<PathBuf, ReconcileError> {
    storage
        .latest(&storage.results_dir(), RESULTS_BASE)
        .await?
        .ok_or(ReconcileError::NoResults)
}

/// The newest results file as one JSON object per row, keyed by header.
///
/// # Errors
///
/// Returns [`ReconcileError::NoResults`] when no reconciliation has run.
pub async fn load_latest_results(
    storage: &Storage,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ReconcileError> {
    let (_, bytes) = storage
        .read_latest(&storage.results_dir(), RESULTS_BASE)
        .await?
        .ok_or(ReconcileError::NoResults)?;
    Ok(csv_io::read_records(&bytes)?)
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
