//! Reconciliation results: on-demand runs, JSON view and CSV export.

use axum::Json;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::services::pipeline;
use crate::services::reconcile::{ReconcileError, ReconcileSummary, latest_results_file, load_latest_results};
use crate::services::storage::StorageError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub file: String,
    pub summary: ReconcileSummary,
}

/// `POST /reconcile`
pub async fn reconcile(State(state): State<AppState>) -> Result<Json<ReconcileResponse>, ApiError> {
    let run = pipeline::reconcile_now(&state).await?;
    let file = run
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Json(ReconcileResponse { success: true, file, summary: run.reconciliation.summary }))
}

/// `GET /reconciliation-results`
pub async fn reconciliation_results(State(state): State<AppState>) -> Result<Json<Vec<Map<String, Value>>>, ApiError> {
    Ok(Json(load_latest_results(&state.storage).await?))
}

/// `GET /export-reconciliation`: the newest results file as a download.
pub async fn export_reconciliation(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = latest_results_file(&state.storage).await?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ReconcileError::NoResults.into()),
        Err(e) => return Err(StorageError::from(e).into()),
    };
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}
