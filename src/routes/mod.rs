//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The browser front-end is served from a different origin, so every route
//! sits behind a permissive CORS layer. When `STATIC_DIR` is set the built
//! front-end is served as the fallback.

pub mod invoices;
pub mod progress;
pub mod results;
pub mod statement;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::multipart::{Field, Multipart};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let static_dir = state.config.static_dir.clone();
    let body_limit = state.config.max_upload_bytes;

    let router = Router::new()
        .route("/uploaded-invoices", get(invoices::list_invoices))
        .route("/uploaded-invoices/{filename}", delete(invoices::delete_invoice))
        .route("/upload-invoices", post(invoices::upload_invoices))
        .route("/uploaded-statement", get(statement::statement_info))
        .route("/upload-statement", post(statement::upload_statement))
        .route("/statement-preview", get(statement::statement_preview))
        .route("/reconcile", post(results::reconcile))
        .route("/reconciliation-results", get(results::reconciliation_results))
        .route("/export-reconciliation", get(results::export_reconciliation))
        .route("/progress", get(progress::progress))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// One file part of a multipart upload.
pub(crate) struct UploadedFile {
    pub file_name: String,
    pub bytes: axum::body::Bytes,
}

async fn read_field(field: Field<'_>) -> Result<UploadedFile, ApiError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::new(e.status(), "E_MULTIPART", e.body_text()))?;
    Ok(UploadedFile { file_name, bytes })
}

/// Collect every part whose field name is one of `fields`, in upload order.
pub(crate) async fn collect_files(mut multipart: Multipart, fields: &[&str]) -> Result<Vec<UploadedFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), "E_MULTIPART", e.body_text()))?
    {
        if field.name().is_some_and(|n| fields.contains(&n)) {
            files.push(read_field(field).await?);
        }
    }
    Ok(files)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
