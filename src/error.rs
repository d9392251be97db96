//! HTTP error surface.
//!
//! DESIGN
//! ======
//! Every service error enum implements [`ErrorCode`]: a grepable `E_*` code,
//! the HTTP status it maps to, and whether a client may retry. Handlers
//! convert typed errors into [`ApiError`] with `?`, which renders the JSON
//! body `{"error", "code", "retryable"}`. The browser client reads `error`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Grepable error code, status and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn retryable(&self) -> bool {
        false
    }
}

/// Error returned by HTTP handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), retryable: false }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_BAD_REQUEST", message)
    }

    /// Build from a typed error, keeping its code, status and retryable flag.
    #[must_use]
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self {
            status: err.status(),
            code: err.error_code(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }

    /// Prefix the message, e.g. `Failed to process statement: <cause>`.
    #[must_use]
    pub fn context(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix}: {}", self.message);
        self
    }

    /// Override the status while keeping the code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl<E: ErrorCode> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self::from_error(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, status = %self.status, error = %self.message, "request failed");
        } else {
            tracing::debug!(code = self.code, status = %self.status, error = %self.message, "request rejected");
        }

        let body = json!({
            "error": self.message,
            "code": self.code,
            "retryable": self.retryable,
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
