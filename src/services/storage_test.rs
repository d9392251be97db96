use super::*;

fn temp_storage() -> (tempfile::TempDir, Storage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path());
    (dir, storage)
}

// =============================================================================
// sanitize_filename
// =============================================================================

#[test]
fn sanitize_keeps_plain_names() {
    assert_eq!(sanitize_filename("invoice-001.pdf").as_deref(), Some("invoice-001.pdf"));
}

#[test]
fn sanitize_strips_directories() {
    assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
    assert_eq!(sanitize_filename(r"C:\scans\inv 7.png").as_deref(), Some("inv_7.png"));
}

#[test]
fn sanitize_drops_unsafe_characters() {
    assert_eq!(sanitize_filename("inv$oice (1).jpg").as_deref(), Some("invoice_1.jpg"));
}

#[test]
fn sanitize_transliterates_accents() {
    assert_eq!(sanitize_filename("café.pdf").as_deref(), Some("cafe.pdf"));
    assert_eq!(sanitize_filename("ré$umé (1).jpg").as_deref(), Some("reume_1.jpg"));
    assert_eq!(sanitize_filename("ﬁle.png").as_deref(), Some("file.png"));
}

#[test]
fn sanitize_rejects_empty_results() {
    assert!(sanitize_filename("").is_none());
    assert!(sanitize_filename("..").is_none());
    assert!(sanitize_filename("/").is_none());
}

#[test]
fn has_extension_is_case_insensitive() {
    assert!(has_extension("SCAN.PDF", INVOICE_EXTENSIONS));
    assert!(has_extension("a.jpeg", INVOICE_EXTENSIONS));
    assert!(!has_extension("a.csv", INVOICE_EXTENSIONS));
    assert!(!has_extension("noext", INVOICE_EXTENSIONS));
    assert!(has_extension("statement.CSV", STATEMENT_EXTENSIONS));
}

// =============================================================================
// run sequences
// =============================================================================

#[test]
fn sequence_names_follow_counter() {
    assert_eq!(sequence_name(RESULTS_BASE, 0), "reconciliation_results.csv");
    assert_eq!(sequence_name(RESULTS_BASE, 3), "reconciliation_results_3.csv");
    assert_eq!(sequence_name("log", 2), "log_2");
}

#[test]
fn sequence_index_parses_members_only() {
    assert_eq!(sequence_index("reconciliation_results.csv", RESULTS_BASE), Some(0));
    assert_eq!(sequence_index("reconciliation_results_12.csv", RESULTS_BASE), Some(12));
    assert_eq!(sequence_index("reconciliation_results_x.csv", RESULTS_BASE), None);
    assert_eq!(sequence_index("reconciliation_results_.csv", RESULTS_BASE), None);
    assert_eq!(sequence_index("reconciliation_results_0.csv", RESULTS_BASE), None);
    assert_eq!(sequence_index("other.csv", RESULTS_BASE), None);
    assert_eq!(sequence_index(".tmp", RESULTS_BASE), None);
}

#[tokio::test]
async fn write_next_never_overwrites() {
    let (_dir, storage) = temp_storage();
    let results = storage.results_dir();

    let first = storage.write_next(&results, RESULTS_BASE, b"a").await.unwrap();
    let second = storage.write_next(&results, RESULTS_BASE, b"b").await.unwrap();
    let third = storage.write_next(&results, RESULTS_BASE, b"c").await.unwrap();

    assert!(first.ends_with("reconciliation_results.csv"));
    assert!(second.ends_with("reconciliation_results_1.csv"));
    assert!(third.ends_with("reconciliation_results_2.csv"));

    let (latest, bytes) = storage.read_latest(&results, RESULTS_BASE).await.unwrap().unwrap();
    assert_eq!(latest, third);
    assert_eq!(bytes, b"c");
}

#[tokio::test]
async fn latest_of_missing_dir_is_none() {
    let (_dir, storage) = temp_storage();
    assert!(storage.latest(&storage.results_dir(), RESULTS_BASE).await.unwrap().is_none());
}

// =============================================================================
// invoices
// =============================================================================

#[tokio::test]
async fn save_list_and_delete_invoice() {
    let (_dir, storage) = temp_storage();

    let name = storage.save_invoice("My Invoice.pdf", b"%PDF-1.4").await.unwrap();
    assert_eq!(name, "My_Invoice.pdf");

    let files = storage.list_invoices().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "My_Invoice.pdf");
    assert_eq!(files[0].size, 8);
    assert!(files[0].uploaded_at > 0.0);

    storage.delete_invoice("My_Invoice.pdf").await.unwrap();
    assert!(storage.list_invoices().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_missing_invoice_is_not_found() {
    let (_dir, storage) = temp_storage();
    storage.ensure_layout().await.unwrap();
    let err = storage.delete_invoice("nope.pdf").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    assert_eq!(err.to_string(), "File not found");
}

#[tokio::test]
async fn delete_rejects_path_traversal() {
    let (dir, storage) = temp_storage();
    std::fs::write(dir.path().join("keep.pdf"), b"x").unwrap();
    storage.ensure_layout().await.unwrap();

    let err = storage.delete_invoice("../keep.pdf").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    assert!(dir.path().join("keep.pdf").exists());
}

#[tokio::test]
async fn list_ignores_non_invoice_files() {
    let (_dir, storage) = temp_storage();
    storage.save_invoice("b.png", b"png").await.unwrap();
    storage.save_invoice("a.pdf", b"pdf").await.unwrap();
    std::fs::write(storage.invoice_dir().join("notes.txt"), b"x").unwrap();

    let names: Vec<String> = storage.list_invoices().await.unwrap().into_iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["a.pdf", "b.png"]);
}

#[tokio::test]
async fn clear_invoices_removes_everything() {
    let (_dir, storage) = temp_storage();
    storage.save_invoice("a.pdf", b"1").await.unwrap();
    storage.save_invoice("b.jpg", b"2").await.unwrap();

    assert_eq!(storage.clear_invoices().await.unwrap(), 2);
    assert!(storage.invoice_paths().await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_missing_folder_is_noop() {
    let (_dir, storage) = temp_storage();
    assert_eq!(storage.clear_invoices().await.unwrap(), 0);
}

// =============================================================================
// statement
// =============================================================================

#[tokio::test]
async fn statement_round_trip() {
    let (_dir, storage) = temp_storage();
    assert!(storage.statement_info().await.unwrap().is_none());
    assert!(storage.read_statement().await.unwrap().is_none());

    storage.save_statement(b"Expected Invoice ID\nINV-1\n").await.unwrap();

    let info = storage.statement_info().await.unwrap().unwrap();
    assert_eq!(info.name, STATEMENT_FILE);
    assert_eq!(info.size, 26);
    assert_eq!(storage.read_statement().await.unwrap().unwrap(), b"Expected Invoice ID\nINV-1\n");
}

#[test]
fn storage_error_statuses() {
    assert_eq!(StorageError::InvalidName(String::new()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(StorageError::NotFound(String::new()).status(), StatusCode::NOT_FOUND);
    assert_eq!(StorageError::NotFound(String::new()).error_code(), "E_FILE_NOT_FOUND");
}
