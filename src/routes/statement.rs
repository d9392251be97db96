//! Supplier statement upload and preview.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

use super::collect_files;
use crate::error::ApiError;
use crate::services::pipeline;
use crate::services::statement::{StatementPreview, load_preview, parse_statement};
use crate::services::storage::{STATEMENT_EXTENSIONS, StoredFile, has_extension};
use crate::state::AppState;

const STATEMENT_FIELD: &str = "statement";

/// `GET /uploaded-statement`: `null` when none is stored.
pub async fn statement_info(State(state): State<AppState>) -> Result<Json<Option<StoredFile>>, ApiError> {
    Ok(Json(state.storage.statement_info().await?))
}

/// `POST /upload-statement`
pub async fn upload_statement(State(state): State<AppState>, multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let files = collect_files(multipart, &[STATEMENT_FIELD]).await?;
    let Some(file) = files.into_iter().next() else {
        return Err(ApiError::bad_request("No file part"));
    };
    if file.file_name.is_empty() {
        return Err(ApiError::bad_request("No selected file"));
    }
    if !has_extension(&file.file_name, STATEMENT_EXTENSIONS) {
        return Err(ApiError::bad_request("Invalid file type"));
    }

    parse_statement(&file.bytes).map_err(|e| {
        ApiError::from(e)
            .with_status(StatusCode::BAD_REQUEST)
            .context("Failed to process statement")
    })?;
    state.storage.save_statement(&file.bytes).await?;
    pipeline::process_statement(&state).await?;

    Ok(Json(json!({ "success": true })))
}

/// `GET /statement-preview`
pub async fn statement_preview(State(state): State<AppState>) -> Result<Json<StatementPreview>, ApiError> {
    Ok(Json(load_preview(&state.storage).await?))
}
