use super::*;
use std::sync::Arc;

use crate::services::storage::EXTRACTED_DIR;
use crate::state::test_helpers::MockExtractor;

fn temp_storage() -> (tempfile::TempDir, Storage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path());
    (dir, storage)
}

// =============================================================================
// row construction
// =============================================================================

#[test]
fn from_fields_fills_defaults() {
    let row = ExtractedInvoice::from_fields("invoice_temp_storage/a.pdf", InvoiceFields::default());
    assert_eq!(row.invoice_id, "");
    assert_eq!(row.net_total, "0");
    assert_eq!(row.tax_total, "0");
    assert_eq!(row.total_amount, "0");
    assert_eq!(row.descriptions, NO_DESCRIPTION);
    assert!(!row.is_error());
}

#[test]
fn from_fields_joins_descriptions() {
    let fields = InvoiceFields {
        invoice_id: Some("INV-1".into()),
        descriptions: vec!["Bolts".into(), "Nuts".into()],
        ..InvoiceFields::default()
    };
    let row = ExtractedInvoice::from_fields("p", fields);
    assert_eq!(row.descriptions, "Bolts; Nuts");
}

#[test]
fn failed_row_marks_every_field() {
    let row = ExtractedInvoice::failed("p", "timeout");
    assert!(row.is_error());
    assert_eq!(row.total_amount, ERROR_MARKER);
    assert_eq!(row.descriptions, "Error: timeout");
}

#[test]
fn parse_extracted_reads_header_names() {
    let csv = "File Path,Invoice ID,Invoice Date,Net Total,Tax Total,Total Amount,Descriptions\n\
               invoice_temp_storage/a.pdf,INV-1,2024-01-01,£10.00,£2.00,£12.00,Widgets\n";
    let rows = parse_extracted(csv.as_bytes()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].invoice_id, "INV-1");
    assert_eq!(rows[0].total_amount, "£12.00");
}

#[test]
fn header_constant_follows_field_names() {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.serialize(ExtractedInvoice::failed("p", "x")).unwrap();
    let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    let header = <ExtractedInvoice as csv_io::CsvRow>::HEADER.join(",");
    assert_eq!(text.lines().next(), Some(header.as_str()));
}

#[test]
fn parse_extracted_tolerates_missing_columns() {
    let rows = parse_extracted(b"Invoice ID,Total Amount\nINV-2,5\n").unwrap();
    assert_eq!(rows[0].invoice_id, "INV-2");
    assert_eq!(rows[0].file_path, "");
}

// =============================================================================
// run_extraction
// =============================================================================

#[tokio::test]
async fn run_with_no_invoices_writes_nothing() {
    let (_dir, storage) = temp_storage();
    let extractor = Arc::new(MockExtractor::new());
    let progress = ProgressTracker::new();

    let run = run_extraction(&storage, extractor.clone(), &progress, 2).await.unwrap();
    assert!(run.is_none());
    assert_eq!(extractor.calls(), 0);
    assert!(storage.latest(&storage.extracted_dir(), EXTRACTED_BASE).await.unwrap().is_none());
}

#[tokio::test]
async fn run_extracts_in_file_order_and_writes_csv() {
    let (dir, storage) = temp_storage();
    storage.save_invoice("c.pdf", b"INV-3,30").await.unwrap();
    storage.save_invoice("a.pdf", b"INV-1,10").await.unwrap();
    storage.save_invoice("b.png", b"INV-2,20").await.unwrap();
    let extractor = Arc::new(MockExtractor::new());
    let progress = ProgressTracker::new();

    let run = run_extraction(&storage, extractor.clone(), &progress, 3)
        .await
        .unwrap()
        .unwrap();

    let ids: Vec<&str> = run.invoices.iter().map(|i| i.invoice_id.as_str()).collect();
    assert_eq!(ids, vec!["INV-1", "INV-2", "INV-3"]);
    assert_eq!(run.invoices[0].file_path, "invoice_temp_storage/a.pdf");
    assert_eq!(extractor.calls(), 3);
    assert_eq!(progress.snapshot(), crate::services::progress::Progress { processed: 3, total: 3 });
    assert!(run.path.starts_with(dir.path().join(EXTRACTED_DIR)));

    let (latest, rows) = load_latest(&storage).await.unwrap().unwrap();
    assert_eq!(latest, run.path);
    assert_eq!(rows, run.invoices);
}

#[tokio::test]
async fn failures_become_error_rows_and_empty_results_are_skipped() {
    let (_dir, storage) = temp_storage();
    storage.save_invoice("a.pdf", b"FAIL:corrupt").await.unwrap();
    storage.save_invoice("b.pdf", b"EMPTY").await.unwrap();
    storage.save_invoice("c.pdf", b"INV-9,1").await.unwrap();
    let extractor = Arc::new(MockExtractor::new());
    let progress = ProgressTracker::new();

    let run = run_extraction(&storage, extractor, &progress, 1).await.unwrap().unwrap();

    assert_eq!(run.invoices.len(), 2);
    assert!(run.invoices[0].is_error());
    assert!(run.invoices[0].descriptions.contains("corrupt"));
    assert_eq!(run.invoices[1].invoice_id, "INV-9");
    assert_eq!(run.failed_count(), 1);
    assert!(progress.snapshot().is_complete());
}

#[tokio::test]
async fn each_run_writes_a_new_file() {
    let (_dir, storage) = temp_storage();
    storage.save_invoice("a.pdf", b"INV-1,10").await.unwrap();
    let extractor = Arc::new(MockExtractor::new());
    let progress = ProgressTracker::new();

    let first = run_extraction(&storage, extractor.clone(), &progress, 1).await.unwrap().unwrap();
    let second = run_extraction(&storage, extractor, &progress, 1).await.unwrap().unwrap();
    assert_ne!(first.path, second.path);
    assert!(second.path.ends_with("extracted_invoices_1.csv"));
}

#[tokio::test]
async fn run_with_no_recognized_invoice_still_writes_header() {
    let (_dir, storage) = temp_storage();
    storage.save_invoice("a.pdf", b"EMPTY").await.unwrap();
    let progress = ProgressTracker::new();

    let run = run_extraction(&storage, Arc::new(MockExtractor::new()), &progress, 1)
        .await
        .unwrap()
        .unwrap();
    assert!(run.invoices.is_empty());

    let bytes = tokio::fs::read(&run.path).await.unwrap();
    let text = std::str::from_utf8(csv_io::strip_bom(&bytes)).unwrap();
    assert_eq!(
        text,
        "File Path,Invoice ID,Invoice Date,Net Total,Tax Total,Total Amount,Descriptions\n"
    );
    assert!(load_latest(&storage).await.unwrap().unwrap().1.is_empty());
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn run_future_is_send() {
    let (_dir, storage) = temp_storage();
    let progress = ProgressTracker::new();
    let fut = run_extraction(&storage, Arc::new(MockExtractor::new()), &progress, 2);
    assert_send(&fut);
}

#[test]
fn not_configured_maps_through() {
    let err = ExtractionError::from(ExtractError::NotConfigured);
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err.error_code(), "E_EXTRACT_NOT_CONFIGURED");
}
