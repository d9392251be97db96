use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::json;

const SUCCEEDED: &str = r#"{
  "status": "succeeded",
  "analyzeResult": {
    "documents": [{
      "docType": "invoice",
      "fields": {
        "InvoiceId": {"type": "string", "valueString": "INV-100", "content": "INV-100"},
        "InvoiceDate": {"type": "date", "valueDate": "2024-04-01", "content": "01/04/2024"},
        "SubTotal": {"type": "currency", "valueCurrency": {"amount": 100.0, "currencySymbol": "£", "currencyCode": "GBP"}},
        "TotalTax": {"type": "currency", "valueCurrency": {"amount": 20.0, "currencySymbol": "£"}},
        "InvoiceTotal": {"type": "currency", "valueCurrency": {"amount": 120.0, "currencySymbol": "£"}},
        "Items": {"type": "array", "valueArray": [
          {"type": "object", "valueObject": {"Description": {"type": "string", "valueString": "Widgets"}}},
          {"type": "object", "valueObject": {"Amount": {"type": "currency", "valueCurrency": {"amount": 1.0}}}},
          {"type": "object", "valueObject": {"Description": {"type": "string", "content": "Shipping"}}}
        ]}
      }
    }]
  }
}"#;

// =============================================================================
// parsing
// =============================================================================

#[test]
fn parse_succeeded_operation_maps_fields() {
    let op = parse_operation(SUCCEEDED).unwrap();
    assert_eq!(op.status, "succeeded");
    let fields = invoice_fields(&op.analyze_result.unwrap()).unwrap();
    assert_eq!(fields.invoice_id.as_deref(), Some("INV-100"));
    assert_eq!(fields.invoice_date.as_deref(), Some("2024-04-01"));
    assert_eq!(fields.net_total.as_deref(), Some("£100.00"));
    assert_eq!(fields.tax_total.as_deref(), Some("£20.00"));
    assert_eq!(fields.total_amount.as_deref(), Some("£120.00"));
    assert_eq!(fields.descriptions, vec!["Widgets", "Shipping"]);
}

#[test]
fn no_documents_yields_none() {
    let op = parse_operation(r#"{"status":"succeeded","analyzeResult":{"documents":[]}}"#).unwrap();
    assert!(invoice_fields(&op.analyze_result.unwrap()).is_none());
}

#[test]
fn missing_fields_stay_none() {
    let op = parse_operation(r#"{"status":"succeeded","analyzeResult":{"documents":[{"fields":{}}]}}"#).unwrap();
    let fields = invoice_fields(&op.analyze_result.unwrap()).unwrap();
    assert_eq!(fields, InvoiceFields::default());
}

#[test]
fn amount_falls_back_to_number_then_content() {
    let number: DocumentField = serde_json::from_str(r#"{"valueNumber": 12.5}"#).unwrap();
    assert_eq!(field_amount(&number).as_deref(), Some("12.50"));
    let content: DocumentField = serde_json::from_str(r#"{"content": " $9.99 "}"#).unwrap();
    assert_eq!(field_amount(&content).as_deref(), Some("$9.99"));
    let blank: DocumentField = serde_json::from_str(r#"{"content": "  "}"#).unwrap();
    assert!(field_amount(&blank).is_none());
}

#[test]
fn parse_garbage_is_api_parse_error() {
    let err = parse_operation("<html>").unwrap_err();
    assert!(matches!(err, ExtractError::ApiParse(_)));
}

#[test]
fn analyze_url_includes_model_and_version() {
    let client = AzureInvoiceClient::new(DocIntelConfig::new("https://example.test/", "k")).unwrap();
    assert_eq!(
        client.analyze_url(),
        "https://example.test/formrecognizer/documentModels/prebuilt-invoice:analyze?api-version=2023-07-31"
    );
}

// =============================================================================
// long-running operation against a local mock
// =============================================================================

#[derive(Clone)]
struct MockAzure {
    base: String,
    polls: Arc<AtomicU32>,
    running_polls: u32,
    final_body: &'static str,
}

async fn mock_analyze(State(mock): State<MockAzure>, headers: HeaderMap) -> impl IntoResponse {
    if headers.get(KEY_HEADER).and_then(|v| v.to_str().ok()) != Some("secret") {
        return (StatusCode::UNAUTHORIZED, HeaderMap::new(), "bad key").into_response();
    }
    let mut out = HeaderMap::new();
    out.insert(
        OPERATION_LOCATION,
        format!("{}/operations/1", mock.base).parse().unwrap(),
    );
    (StatusCode::ACCEPTED, out, "").into_response()
}

async fn mock_operation(State(mock): State<MockAzure>) -> impl IntoResponse {
    let seen = mock.polls.fetch_add(1, Ordering::SeqCst);
    if seen < mock.running_polls {
        return json!({"status": "running"}).to_string();
    }
    mock.final_body.to_string()
}

async fn spawn_mock(running_polls: u32, final_body: &'static str) -> (String, Arc<AtomicU32>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let polls = Arc::new(AtomicU32::new(0));
    let mock = MockAzure { base: base.clone(), polls: polls.clone(), running_polls, final_body };
    let app = Router::new()
        .route(
            "/formrecognizer/documentModels/{model}",
            post(mock_analyze),
        )
        .route("/operations/1", get(mock_operation))
        .with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, polls)
}

fn fast_config(base: &str, key: &str, max_polls: u32) -> DocIntelConfig {
    let mut config = DocIntelConfig::new(base, key);
    config.poll_interval_ms = 5;
    config.max_polls = max_polls;
    config
}

#[tokio::test]
async fn extract_polls_until_succeeded() {
    let (base, polls) = spawn_mock(2, SUCCEEDED).await;
    let client = AzureInvoiceClient::new(fast_config(&base, "secret", 10)).unwrap();

    let fields = client
        .extract("inv.pdf", "application/pdf", b"%PDF".to_vec())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(fields.invoice_id.as_deref(), Some("INV-100"));
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn extract_reports_failed_analysis() {
    let (base, _) = spawn_mock(0, r#"{"status":"failed","error":{"code":"InvalidContent","message":"corrupt file"}}"#).await;
    let client = AzureInvoiceClient::new(fast_config(&base, "secret", 10)).unwrap();

    let err = client.extract("inv.pdf", "application/pdf", Vec::new()).await.unwrap_err();
    assert!(matches!(err, ExtractError::AnalysisFailed(ref m) if m == "corrupt file"));
}

#[tokio::test]
async fn extract_times_out_after_max_polls() {
    let (base, polls) = spawn_mock(u32::MAX, SUCCEEDED).await;
    let client = AzureInvoiceClient::new(fast_config(&base, "secret", 3)).unwrap();

    let err = client.extract("inv.pdf", "application/pdf", Vec::new()).await.unwrap_err();
    assert!(matches!(err, ExtractError::Timeout { polls: 3 }));
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn extract_surfaces_rejected_submission() {
    let (base, _) = spawn_mock(0, SUCCEEDED).await;
    let client = AzureInvoiceClient::new(fast_config(&base, "wrong", 3)).unwrap();

    let err = client.extract("inv.pdf", "application/pdf", Vec::new()).await.unwrap_err();
    assert!(matches!(err, ExtractError::ApiResponse { status: 401, .. }));
}
