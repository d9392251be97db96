//! Pipeline service: the extraction and reconciliation runs that uploads
//! trigger.
//!
//! DESIGN
//! ======
//! Every entry point takes `AppState::pipeline_lock` for its whole run, so
//! two uploads arriving together extract and reconcile one after the other
//! instead of racing on the output sequences. The invoice upload handler
//! takes the lock itself before touching the invoice folder and then calls
//! [`process_invoices_locked`]. Reconciliation runs
//! automatically only when its other input already exists:
//!
//! - after invoices are processed, if a statement is stored
//! - after a statement is stored, if an extraction output exists

use std::sync::Arc;

use axum::http::StatusCode;
use tokio::sync::MutexGuard;
use tracing::info;

use crate::docintel::{ExtractError, InvoiceExtractor};
use crate::error::ErrorCode;
use crate::services::extraction::{ExtractionError, ExtractionRun, run_extraction};
use crate::services::reconcile::{ReconcileError, ReconcileRun, run_reconciliation};
use crate::services::storage::{EXTRACTED_BASE, StorageError};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ExtractError> for PipelineError {
    fn from(err: ExtractError) -> Self {
        Self::Extraction(err.into())
    }
}

impl ErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Extraction(e) => e.error_code(),
            Self::Reconcile(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Extraction(e) => e.status(),
            Self::Reconcile(e) => e.status(),
            Self::Storage(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Extraction(e) => e.retryable(),
            Self::Reconcile(_) | Self::Storage(_) => false,
        }
    }
}

/// What one invoice processing pass produced.
#[derive(Debug, Default)]
pub struct InvoiceOutcome {
    /// `None` when the invoice folder was empty.
    pub extraction: Option<ExtractionRun>,
    /// `None` when no statement is stored.
    pub reconciliation: Option<ReconcileRun>,
}

/// Extract every stored invoice, then reconcile if a statement is stored.
///
/// # Errors
///
/// Returns an error if no extractor is configured, or if extraction or
/// reconciliation fails.
pub async fn process_invoices(state: &AppState) -> Result<InvoiceOutcome, PipelineError> {
    let extractor = require_extractor(state)?;
    let guard = state.pipeline_lock.lock().await;
    process_invoices_locked(state, extractor, &guard).await
}

/// The configured extractor.
///
/// # Errors
///
/// Returns [`ExtractError::NotConfigured`] when extraction is disabled.
pub fn require_extractor(state: &AppState) -> Result<Arc<dyn InvoiceExtractor>, PipelineError> {
    state.extractor.clone().ok_or_else(|| ExtractError::NotConfigured.into())
}

/// [`process_invoices`] for a caller that already holds `pipeline_lock`.
///
/// # Errors
///
/// Returns an error if extraction or reconciliation fails.
pub async fn process_invoices_locked(
    state: &AppState,
    extractor: Arc<dyn InvoiceExtractor>,
    _held: &MutexGuard<'_, ()>,
) -> Result<InvoiceOutcome, PipelineError> {
    let extraction = run_extraction(
        &state.storage,
        extractor,
        &state.progress,
        state.config.extract_concurrency,
    )
    .await?;
    if extraction.is_none() {
        return Ok(InvoiceOutcome::default());
    }

    let reconciliation = if state.storage.statement_info().await?.is_some() {
        Some(run_reconciliation(&state.storage).await?)
    } else {
        info!("no statement stored; skipping reconciliation");
        None
    };
    Ok(InvoiceOutcome { extraction, reconciliation })
}

/// Reconcile after a statement upload, if any invoices have been extracted.
///
/// # Errors
///
/// Returns an error if reconciliation fails.
pub async fn process_statement(state: &AppState) -> Result<Option<ReconcileRun>, PipelineError> {
    let _guard = state.pipeline_lock.lock().await;
    let storage = &state.storage;
    if storage.latest(&storage.extracted_dir(), EXTRACTED_BASE).await?.is_none() {
        info!("no extracted invoices yet; skipping reconciliation");
        return Ok(None);
    }
    Ok(Some(run_reconciliation(storage).await?))
}

/// Reconcile on demand.
///
/// # Errors
///
/// Returns an error if an input is missing or reconciliation fails.
pub async fn reconcile_now(state: &AppState) -> Result<ReconcileRun, PipelineError> {
    let _guard = state.pipeline_lock.lock().await;
    Ok(run_reconciliation(&state.storage).await?)
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
