//! Invoice upload, listing and deletion.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::collect_files;
use crate::error::ApiError;
use crate::services::pipeline;
use crate::services::storage::{INVOICE_EXTENSIONS, StoredFile, has_extension};
use crate::state::AppState;

/// Multipart field names the front-end uses for invoice files.
const INVOICE_FIELDS: &[&str] = &["files[]", "invoices"];

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub append: Option<String>,
}

impl UploadQuery {
    fn append(&self) -> bool {
        self.append.as_deref().is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub files: Vec<String>,
}

/// `GET /uploaded-invoices`
pub async fn list_invoices(State(state): State<AppState>) -> Result<Json<Vec<StoredFile>>, ApiError> {
    Ok(Json(state.storage.list_invoices().await?))
}

/// `DELETE /uploaded-invoices/{filename}`
pub async fn delete_invoice(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Json<Value>, ApiError> {
    let _guard = state.pipeline_lock.lock().await;
    state.storage.delete_invoice(&filename).await?;
    Ok(Json(json!({ "success": true })))
}

/// `POST /upload-invoices?append=<bool>`
///
/// Stores the uploaded invoices (replacing the folder unless appending),
/// then extracts every stored invoice and reconciles when a statement exists.
/// The folder is left untouched when extraction is not configured, and it is
/// only changed while the pipeline lock is held.
pub async fn upload_invoices(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let files = collect_files(multipart, INVOICE_FIELDS).await?;
    let Some(first) = files.first() else {
        return Err(ApiError::bad_request("No file part"));
    };
    if first.file_name.is_empty() {
        return Err(ApiError::bad_request("No selected file"));
    }

    let extractor = pipeline::require_extractor(&state)?;
    let guard = state.pipeline_lock.lock().await;

    if !query.append() {
        state.storage.clear_invoices().await?;
    }

    let mut saved = Vec::with_capacity(files.len());
    for file in &files {
        if !has_extension(&file.file_name, INVOICE_EXTENSIONS) {
            warn!(file = %file.file_name, "skipping upload with unsupported extension");
            continue;
        }
        saved.push(state.storage.save_invoice(&file.file_name, &file.bytes).await?);
    }

    if saved.is_empty() {
        return Ok(Json(UploadResponse { success: true, message: "No files were saved", files: saved }));
    }

    info!(files = saved.len(), append = query.append(), "invoices uploaded");
    pipeline::process_invoices_locked(&state, extractor, &guard).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Files uploaded and processed successfully",
        files: saved,
    }))
}
