use super::*;

// =============================================================================
// ExtractError::error_code / status
// =============================================================================

#[test]
fn not_configured_is_service_unavailable() {
    let err = ExtractError::NotConfigured;
    assert_eq!(err.error_code(), "E_EXTRACT_NOT_CONFIGURED");
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(!err.retryable());
}

#[test]
fn provider_failures_are_bad_gateway() {
    for err in [
        ExtractError::ApiRequest("reset".into()),
        ExtractError::ApiResponse { status: 400, body: String::new() },
        ExtractError::ApiParse("json".into()),
        ExtractError::AnalysisFailed("corrupt".into()),
        ExtractError::Timeout { polls: 3 },
    ] {
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY, "{err}");
    }
}

#[test]
fn local_failures_are_internal() {
    assert_eq!(ExtractError::ConfigParse("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        ExtractError::MissingCredentials { var: "K".into() }.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn retryable_on_throttle_and_server_errors() {
    assert!(ExtractError::ApiResponse { status: 429, body: String::new() }.retryable());
    assert!(ExtractError::ApiResponse { status: 503, body: String::new() }.retryable());
    assert!(!ExtractError::ApiResponse { status: 401, body: String::new() }.retryable());
    assert!(ExtractError::Timeout { polls: 1 }.retryable());
    assert!(!ExtractError::AnalysisFailed("x".into()).retryable());
}

#[test]
fn missing_credentials_names_the_variable() {
    let err = ExtractError::MissingCredentials { var: "AZURE_DOCUMENT_INTELLIGENCE_KEY".into() };
    assert!(err.to_string().contains("AZURE_DOCUMENT_INTELLIGENCE_KEY"));
}

// =============================================================================
// content_type_for
// =============================================================================

#[test]
fn content_types_by_extension() {
    assert_eq!(content_type_for("a.pdf"), "application/pdf");
    assert_eq!(content_type_for("a.PNG"), "image/png");
    assert_eq!(content_type_for("a.jpg"), "image/jpeg");
    assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
    assert_eq!(content_type_for("a.tiff"), "application/octet-stream");
    assert_eq!(content_type_for("noext"), "application/octet-stream");
}
