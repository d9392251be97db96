//! Azure Document Intelligence REST client.
//!
//! Analysis is a long-running operation: `POST .../{model}:analyze` returns
//! `202 Accepted` with an `Operation-Location` header, which is polled until
//! the operation reports `succeeded` or `failed`. Pure parsing lives in
//! `parse_operation` and `invoice_fields` for testability.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::config::DocIntelConfig;
use super::types::{ExtractError, InvoiceExtractor, InvoiceFields};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "operation-location";

// =============================================================================
// CLIENT
// =============================================================================

pub struct AzureInvoiceClient {
    http: reqwest::Client,
    config: DocIntelConfig,
}

impl AzureInvoiceClient {
    /// Build a client for the configured resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: DocIntelConfig) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ExtractError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    #[must_use]
    pub fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.config.endpoint, self.config.model, self.config.api_version
        )
    }

    /// Submit a document and return the operation URL to poll.
    async fn begin_analyze(&self, content_type: &str, bytes: Vec<u8>) -> Result<String, ExtractError> {
        let response = self
            .http
            .post(self.analyze_url())
            .header(KEY_HEADER, &self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ExtractError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 202 {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::ApiResponse { status, body });
        }

        response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ExtractError::ApiParse("missing Operation-Location header".into()))
    }

    /// Poll an analyze operation until it leaves the running states.
    async fn poll(&self, operation_url: &str) -> Result<AnalyzeResult, ExtractError> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        for attempt in 1..=self.config.max_polls {
            let response = self
                .http
                .get(operation_url)
                .header(KEY_HEADER, &self.config.api_key)
                .send()
                .await
                .map_err(|e| ExtractError::ApiRequest(e.to_string()))?;

            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| ExtractError::ApiRequest(e.to_string()))?;
            if status != 200 {
                return Err(ExtractError::ApiResponse { status, body: text });
            }

            let operation = parse_operation(&text)?;
            match operation.status.as_str() {
                "succeeded" => {
                    return operation
                        .analyze_result
                        .ok_or_else(|| ExtractError::ApiParse("succeeded operation has no analyzeResult".into()));
                }
                "failed" | "canceled" => {
                    let message = operation
                        .error
                        .and_then(|e| e.message.or(e.code))
                        .unwrap_or_else(|| format!("operation {}", operation.status));
                    return Err(ExtractError::AnalysisFailed(message));
                }
                other => debug!(attempt, status = other, "analysis still running"),
            }
            tokio::time::sleep(interval).await;
        }
        Err(ExtractError::Timeout { polls: self.config.max_polls })
    }
}

#[async_trait::async_trait]
impl InvoiceExtractor for AzureInvoiceClient {
    async fn extract(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<InvoiceFields>, ExtractError> {
        debug!(file = file_name, content_type, size = bytes.len(), model = self.model(), "submitting invoice");
        let operation_url = self.begin_analyze(content_type, bytes).await?;
        let result = self.poll(&operation_url).await?;
        Ok(invoice_fields(&result))
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    documents: Vec<AnalyzedDocument>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedDocument {
    #[serde(default)]
    fields: HashMap<String, DocumentField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentField {
    value_string: Option<String>,
    value_date: Option<String>,
    value_number: Option<f64>,
    value_currency: Option<CurrencyValue>,
    value_array: Option<Vec<DocumentField>>,
    value_object: Option<HashMap<String, DocumentField>>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencyValue {
    amount: f64,
    currency_symbol: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_operation(json: &str) -> Result<AnalyzeOperation, ExtractError> {
    serde_json::from_str(json).map_err(|e| ExtractError::ApiParse(e.to_string()))
}

fn non_empty(s: Option<&String>) -> Option<String> {
    s.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

fn field_text(field: &DocumentField) -> Option<String> {
    non_empty(field.value_string.as_ref()).or_else(|| non_empty(field.content.as_ref()))
}

fn field_date(field: &DocumentField) -> Option<String> {
    non_empty(field.value_date.as_ref()).or_else(|| non_empty(field.content.as_ref()))
}

fn field_amount(field: &DocumentField) -> Option<String> {
    if let Some(currency) = &field.value_currency {
        let symbol = currency.currency_symbol.as_deref().unwrap_or("");
        return Some(format!("{symbol}{:.2}", currency.amount));
    }
    if let Some(number) = field.value_number {
        return Some(format!("{number:.2}"));
    }
    non_empty(field.content.as_ref())
}

fn item_descriptions(items: &DocumentField) -> Vec<String> {
    items
        .value_array
        .iter()
        .flatten()
        .filter_map(|item| item.value_object.as_ref()?.get("Description"))
        .filter_map(field_text)
        .collect()
}

/// Map the first analyzed document onto invoice fields.
fn invoice_fields(result: &AnalyzeResult) -> Option<InvoiceFields> {
    let doc = result.documents.first()?;
    let fields = &doc.fields;
    Some(InvoiceFields {
        invoice_id: fields.get("InvoiceId").and_then(field_text),
        invoice_date: fields.get("InvoiceDate").and_then(field_date),
        net_total: fields.get("SubTotal").and_then(field_amount),
        tax_total: fields.get("TotalTax").and_then(field_amount),
        total_amount: fields.get("InvoiceTotal").and_then(field_amount),
        descriptions: fields.get("Items").map(item_descriptions).unwrap_or_default(),
    })
}

#[cfg(test)]
#[path = "azure_test.rs"]
mod tests;
