//! Document intelligence: invoice field extraction from scanned documents.
//!
//! DESIGN
//! ======
//! Extraction sits behind the [`InvoiceExtractor`] trait so the pipeline can
//! run against a mock in tests. The production implementation is the Azure
//! Document Intelligence `prebuilt-invoice` model, configured from
//! environment variables by [`from_env`]. When credentials are absent the
//! service still starts; uploads fail with `E_EXTRACT_NOT_CONFIGURED`.

pub mod azure;
pub mod config;
pub mod types;

pub use azure::AzureInvoiceClient;
pub use config::DocIntelConfig;
pub use types::{ExtractError, InvoiceExtractor, InvoiceFields, content_type_for};

/// Build the configured extraction client from environment variables.
///
/// # Errors
///
/// Returns an error if credentials are missing or the HTTP client fails.
pub fn from_env() -> Result<AzureInvoiceClient, ExtractError> {
    AzureInvoiceClient::new(DocIntelConfig::from_env()?)
}
