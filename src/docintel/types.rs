//! Document intelligence types: provider-neutral invoice fields and errors.

use axum::http::StatusCode;

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by invoice extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Extraction credentials were not provided at startup.
    #[error("invoice extraction is not configured")]
    NotConfigured,

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// A required credential environment variable is not set.
    #[error("missing credentials: env var {var} not set")]
    MissingCredentials { var: String },

    /// The HTTP request to the provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned an unexpected HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The provider response could not be interpreted.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The provider accepted the document but reported a failed analysis.
    #[error("document analysis failed: {0}")]
    AnalysisFailed(String),

    /// The analysis did not finish within the polling budget.
    #[error("document analysis still running after {polls} polls")]
    Timeout { polls: u32 },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for ExtractError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "E_EXTRACT_NOT_CONFIGURED",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingCredentials { .. } => "E_MISSING_CREDENTIALS",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::AnalysisFailed(_) => "E_ANALYSIS_FAILED",
            Self::Timeout { .. } => "E_ANALYSIS_TIMEOUT",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::ApiRequest(_)
            | Self::ApiResponse { .. }
            | Self::ApiParse(_)
            | Self::AnalysisFailed(_)
            | Self::Timeout { .. } => StatusCode::BAD_GATEWAY,
            Self::ConfigParse(_) | Self::MissingCredentials { .. } | Self::HttpClientBuild(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ApiRequest(_) | Self::Timeout { .. } | Self::ApiResponse { status: 429 | 500..=599, .. }
        )
    }
}

// =============================================================================
// INVOICE FIELDS
// =============================================================================

/// Fields read from one invoice document. Amounts keep the provider's
/// rendering (currency symbol included) and are parsed only at reconcile time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFields {
    pub invoice_id: Option<String>,
    pub invoice_date: Option<String>,
    pub net_total: Option<String>,
    pub tax_total: Option<String>,
    pub total_amount: Option<String>,
    /// Line item descriptions in document order.
    pub descriptions: Vec<String>,
}

/// MIME type sent to the provider for a stored invoice file.
#[must_use]
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// EXTRACTOR TRAIT
// =============================================================================

/// Provider-neutral async trait for invoice extraction. Enables mocking in tests.
#[async_trait::async_trait]
pub trait InvoiceExtractor: Send + Sync {
    /// Analyze one invoice document.
    ///
    /// Returns `Ok(None)` when the provider finished but recognized no
    /// invoice in the document.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractError`] if the request fails, the analysis fails,
    /// or the response is malformed.
    async fn extract(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<InvoiceFields>, ExtractError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
