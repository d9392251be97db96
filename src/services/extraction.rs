//! Extraction service: run every stored invoice through the extractor.
//!
//! DESIGN
//! ======
//! A run reads the invoice folder, analyzes files with bounded concurrency
//! (results stay in file order), and writes one CSV per run into
//! `extracted_invoices/`. Progress advances once per file.
//!
//! ERROR HANDLING
//! ==============
//! A failure on one file never aborts the run: the file gets an `ERROR` row
//! carrying the message, and reconciliation treats it as unreadable. A file
//! the provider analyzed but found no invoice in produces no row.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::docintel::{ExtractError, InvoiceExtractor, InvoiceFields, content_type_for};
use crate::error::ErrorCode;
use crate::services::csv_io;
use crate::services::progress::ProgressTracker;
use crate::services::storage::{EXTRACTED_BASE, INVOICE_DIR, Storage, StorageError};

pub const ERROR_MARKER: &str = "ERROR";
pub const NO_DESCRIPTION: &str = "No description extracted";

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("extracted invoices CSV is malformed: {0}")]
    Csv(#[from] csv::Error),
}

impl ErrorCode for ExtractionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Extract(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Csv(_) => "E_EXTRACTED_CSV",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Extract(e) => e.status(),
            Self::Storage(e) => e.status(),
            Self::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Extract(e) if e.retryable())
    }
}

/// One row of an extraction output file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedInvoice {
    #[serde(rename = "File Path")]
    pub file_path: String,
    #[serde(rename = "Invoice ID")]
    pub invoice_id: String,
    #[serde(rename = "Invoice Date")]
    pub invoice_date: String,
    #[serde(rename = "Net Total")]
    pub net_total: String,
    #[serde(rename = "Tax Total")]
    pub tax_total: String,
    #[serde(rename = "Total Amount")]
    pub total_amount: String,
    #[serde(rename = "Descriptions")]
    pub descriptions: String,
}

impl csv_io::CsvRow for ExtractedInvoice {
    const HEADER: &'static [&'static str] = &[
        "File Path",
        "Invoice ID",
        "Invoice Date",
        "Net Total",
        "Tax Total",
        "Total Amount",
        "Descriptions",
    ];
}

impl ExtractedInvoice {
    #[must_use]
    pub fn from_fields(file_path: &str, fields: InvoiceFields) -> Self {
        let descriptions = if fields.descriptions.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            fields.descriptions.join("; ")
        };
        Self {
            file_path: file_path.to_string(),
            invoice_id: fields.invoice_id.unwrap_or_default(),
            invoice_date: fields.invoice_date.unwrap_or_default(),
            net_total: fields.net_total.unwrap_or_else(|| "0".into()),
            tax_total: fields.tax_total.unwrap_or_else(|| "0".into()),
            total_amount: fields.total_amount.unwrap_or_else(|| "0".into()),
            descriptions,
        }
    }

    #[must_use]
    pub fn failed(file_path: &str, message: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            invoice_id: ERROR_MARKER.into(),
            invoice_date: ERROR_MARKER.into(),
            net_total: ERROR_MARKER.into(),
            tax_total: ERROR_MARKER.into(),
            total_amount: ERROR_MARKER.into(),
            descriptions: format!("Error: {message}"),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.invoice_id == ERROR_MARKER
    }
}

/// Outcome of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub path: PathBuf,
    pub invoices: Vec<ExtractedInvoice>,
}

impl ExtractionRun {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.invoices.iter().filter(|i| i.is_error()).count()
    }
}

/// Path recorded in the `File Path` column, relative to the data directory.
fn display_path(path: &Path) -> String {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    format!("{INVOICE_DIR}/{name}")
}

async fn extract_one(extractor: Arc<dyn InvoiceExtractor>, path: PathBuf) -> Option<ExtractedInvoice> {
    let shown = display_path(&path);
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(file = %shown, error = %e, "failed to read invoice");
            return Some(ExtractedInvoice::failed(&shown, &e.to_string()));
        }
    };

    match extractor.extract(&name, content_type_for(&name), bytes).await {
        Ok(Some(fields)) => {
            let row = ExtractedInvoice::from_fields(&shown, fields);
            info!(file = %shown, invoice_id = %row.invoice_id, total = %row.total_amount, "invoice extracted");
            Some(row)
        }
        Ok(None) => {
            warn!(file = %shown, "no invoice document recognized");
            None
        }
        Err(e) => {
            warn!(file = %shown, error = %e, "invoice extraction failed");
            Some(ExtractedInvoice::failed(&shown, &e.to_string()))
        }
    }
}

/// Extract every stored invoice and write the run's CSV.
///
/// Returns `None` when the invoice folder holds no invoices.
///
/// # Errors
///
/// Returns an error if the folder cannot be read or the output cannot be written.
pub async fn run_extraction(
    storage: &Storage,
    extractor: Arc<dyn InvoiceExtractor>,
    progress: &ProgressTracker,
    concurrency: usize,
) -> Result<Option<ExtractionRun>, ExtractionError> {
    let paths = storage.invoice_paths().await?;
    if paths.is_empty() {
        info!(dir = %storage.invoice_dir().display(), "no invoices to extract");
        return Ok(None);
    }

    info!(files = paths.len(), concurrency, "extraction started");
    progress.start(paths.len());

    let results: Vec<Option<ExtractedInvoice>> = futures::stream::iter(paths)
        .map(|path| {
            let extractor = Arc::clone(&extractor);
            let progress = progress.clone();
            async move {
                let row = extract_one(extractor, path).await;
                progress.advance();
                row
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;
    let invoices: Vec<ExtractedInvoice> = results.into_iter().flatten().collect();

    let bytes = csv_io::write_rows(&invoices)?;
    let path = storage.write_next(&storage.extracted_dir(), EXTRACTED_BASE, &bytes).await?;
    let run = ExtractionRun { path, invoices };
    info!(
        path = %run.path.display(),
        rows = run.invoices.len(),
        failed = run.failed_count(),
        "extraction finished"
    );
    Ok(Some(run))
}

/// Parse an extraction output file.
///
/// # Errors
///
/// Returns an error if the CSV is malformed.
pub fn parse_extracted(bytes: &[u8]) -> Result<Vec<ExtractedInvoice>, ExtractionError> {
    Ok(csv_io::read_rows(bytes)?)
}

/// The newest extraction output, if any run has happened.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_latest(storage: &Storage) -> Result<Option<(PathBuf, Vec<ExtractedInvoice>)>, ExtractionError> {
    let Some((path, bytes)) = storage.read_latest(&storage.extracted_dir(), EXTRACTED_BASE).await? else {
        return Ok(None);
    };
    Ok(Some((path, parse_extracted(&bytes)?)))
}

#[cfg(test)]
#[path = "extraction_test.rs"]
mod tests;
