//! Supplier statement parsing and preview.
//!
//! A statement is a CSV export from the supplier listing the invoices they
//! expect to be paid for. Only two columns matter: `Expected Invoice ID`
//! (required) and `Expected Total Amount` (optional; totals count as zero
//! when it is absent). Every other column is carried only for the preview.

use axum::http::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::money::parse_amount;
use crate::services::csv_io::reader;
use crate::services::storage::{Storage, StorageError};

pub const ID_COLUMN: &str = "Expected Invoice ID";
pub const TOTAL_COLUMN: &str = "Expected Total Amount";

#[derive(Debug, thiserror::Error)]
pub enum StatementError {
    #[error("No statement file found")]
    Missing,
    #[error("statement CSV is malformed: {0}")]
    Csv(#[from] csv::Error),
    #[error("Statement CSV must contain '{0}' column")]
    MissingColumn(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for StatementError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing => "E_STATEMENT_MISSING",
            Self::Csv(_) => "E_STATEMENT_CSV",
            Self::MissingColumn(_) => "E_STATEMENT_COLUMN",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Missing => StatusCode::NOT_FOUND,
            Self::Csv(_) | Self::MissingColumn(_) => StatusCode::BAD_REQUEST,
            Self::Storage(e) => e.status(),
        }
    }
}

/// One statement row, ID trimmed and amount parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementLine {
    pub invoice_id: String,
    pub expected_total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Statement {
    /// Every data row in file order, including rows with placeholder IDs.
    pub lines: Vec<StatementLine>,
    pub has_totals: bool,
}

impl Statement {
    /// Rows that name a real invoice.
    pub fn valid_lines(&self) -> impl Iterator<Item = &StatementLine> {
        self.lines.iter().filter(|l| !is_placeholder_id(&l.invoice_id))
    }
}

/// Statement contents for the browser preview table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// `true` for IDs that spreadsheet exports produce for empty cells.
#[must_use]
pub fn is_placeholder_id(id: &str) -> bool {
    matches!(id.trim(), "" | "None" | "nan" | "NaN")
}

/// Columns the preview hides: blank headers and spreadsheet filler columns.
fn is_unnamed(header: &str) -> bool {
    let header = header.trim();
    header.is_empty() || header.starts_with("Unnamed:")
}

/// Parse a statement CSV.
///
/// # Errors
///
/// Returns an error if the CSV is malformed or has no `Expected Invoice ID` column.
pub fn parse_statement(bytes: &[u8]) -> Result<Statement, StatementError> {
    let mut rdr = reader(bytes);
    let headers = rdr.headers()?.clone();
    let id_idx = headers
        .iter()
        .position(|h| h.trim() == ID_COLUMN)
        .ok_or(StatementError::MissingColumn(ID_COLUMN))?;
    let total_idx = headers.iter().position(|h| h.trim() == TOTAL_COLUMN);
    if total_idx.is_none() {
        warn!(column = TOTAL_COLUMN, "statement has no total column; totals count as zero");
    }

    let mut lines = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let invoice_id = record.get(id_idx).unwrap_or("").trim().to_string();
        let expected_total = total_idx
            .and_then(|i| record.get(i))
            .map_or(0.0, parse_amount);
        lines.push(StatementLine { invoice_id, expected_total });
    }

    let statement = Statement { lines, has_totals: total_idx.is_some() };
    debug!(
        rows = statement.lines.len(),
        valid = statement.valid_lines().count(),
        "statement parsed"
    );
    Ok(statement)
}

/// Build the preview table for a statement CSV.
///
/// # Errors
///
/// Returns an error if the CSV is malformed.
pub fn preview_statement(bytes: &[u8]) -> Result<StatementPreview, StatementError> {
    let mut rdr = reader(bytes);
    let raw_headers = rdr.headers()?.clone();
    let keep: Vec<usize> = raw_headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !is_unnamed(h))
        .map(|(i, _)| i)
        .collect();

    let headers = keep.iter().map(|&i| raw_headers[i].to_string()).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(
            keep.iter()
                .map(|&i| match record.get(i) {
                    Some(cell) if cell != "nan" && cell != "NaN" => cell.to_string(),
                    _ => String::new(),
                })
                .collect(),
        );
    }
    Ok(StatementPreview { headers, rows })
}

/// Load and parse the stored statement.
///
/// # Errors
///
/// Returns [`StatementError::Missing`] if no statement is stored.
pub async fn load_statement(storage: &Storage) -> Result<Statement, StatementError> {
    let bytes = storage.read_statement().await?.ok_or(StatementError::Missing)?;
    parse_statement(&bytes)
}

/// Preview the stored statement.
///
/// # Errors
///
/// Returns [`StatementError::Missing`] if no statement is stored.
pub async fn load_preview(storage: &Storage) -> Result<StatementPreview, StatementError> {
    let bytes = storage.read_statement().await?.ok_or(StatementError::Missing)?;
    preview_statement(&bytes)
}

#[cfg(test)]
#[path = "statement_test.rs"]
mod tests;
