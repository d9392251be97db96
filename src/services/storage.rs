//! Storage service: the data directory that holds every upload and output.
//!
//! DESIGN
//! ======
//! State lives on disk, one folder per concern under a configurable root:
//!
//! ```text
//! <root>/invoice_temp_storage/            uploaded invoices
//! <root>/supplier_statement.csv           current supplier statement
//! <root>/extracted_invoices/*.csv         one file per extraction run
//! <root>/reconciliation_results/*.csv     one file per reconciliation run
//! ```
//!
//! Run outputs are never overwritten: each run writes the next member of the
//! sequence `name.csv`, `name_1.csv`, `name_2.csv`, ... and readers pick the
//! member with the highest index.
//!
//! ERROR HANDLING
//! ==============
//! Every write lands in a uniquely named temp file first and is renamed into
//! place, so a reader never observes a half-written upload or result file.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use serde::Serialize;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::error::ErrorCode;

pub const INVOICE_DIR: &str = "invoice_temp_storage";
pub const STATEMENT_FILE: &str = "supplier_statement.csv";
pub const EXTRACTED_DIR: &str = "extracted_invoices";
pub const EXTRACTED_BASE: &str = "extracted_invoices.csv";
pub const RESULTS_DIR: &str = "reconciliation_results";
pub const RESULTS_BASE: &str = "reconciliation_results.csv";

/// Extensions the extraction provider can analyze.
pub const INVOICE_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg"];
/// Extensions accepted for a supplier statement upload.
pub const STATEMENT_EXTENSIONS: &[&str] = &["csv"];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid file name '{0}'")]
    InvalidName(String),
    #[error("File not found")]
    NotFound(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "E_INVALID_NAME",
            Self::NotFound(_) => "E_FILE_NOT_FOUND",
            Self::Io(_) => "E_STORAGE_IO",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidName(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A stored file as reported to the browser client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub uploaded_at: f64,
}

/// Handle on the data directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

// =============================================================================
// NAMING
// =============================================================================

/// Reduce an uploaded file name to a safe single path component.
///
/// Keeps the last path component, decomposes it (NFKD) so accented letters
/// fall back to their base letter, turns whitespace into `_`, drops anything
/// outside `[A-Za-z0-9._-]` and trims leading/trailing dots and underscores.
/// Returns `None` when nothing usable remains.
#[must_use]
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = last
        .nfkd()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Case-insensitive extension check against an allow-list.
#[must_use]
pub fn has_extension(name: &str, allowed: &[&str]) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    allowed.iter().any(|a| a.eq_ignore_ascii_case(ext))
}

/// Name of the `index`-th member of a run sequence: `base`, `stem_1.ext`, ...
#[must_use]
pub fn sequence_name(base: &str, index: u32) -> String {
    if index == 0 {
        return base.to_string();
    }
    match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{index}.{ext}"),
        None => format!("{base}_{index}"),
    }
}

/// Position of `name` in the run sequence for `base`, if it belongs to it.
#[must_use]
pub fn sequence_index(name: &str, base: &str) -> Option<u32> {
    if name == base {
        return Some(0);
    }
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (base, None),
    };
    let rest = name.strip_prefix(stem)?.strip_prefix('_')?;
    let digits = match ext {
        Some(ext) => rest.strip_suffix(ext)?.strip_suffix('.')?,
        None => rest,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|i| *i > 0)
}

fn system_time_secs(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

async fn describe(path: &Path, name: String) -> Result<StoredFile, std::io::Error> {
    let meta = tokio::fs::metadata(path).await?;
    let stamp = meta.created().or_else(|_| meta.modified()).map_or(0.0, system_time_secs);
    Ok(StoredFile { name, size: meta.len(), uploaded_at: stamp })
}

/// Write `bytes` to `path` through a temp file in the same directory.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await?;
    let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, std::io::Error> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// =============================================================================
// STORAGE
// =============================================================================

impl Storage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn invoice_dir(&self) -> PathBuf {
        self.root.join(INVOICE_DIR)
    }

    #[must_use]
    pub fn statement_path(&self) -> PathBuf {
        self.root.join(STATEMENT_FILE)
    }

    #[must_use]
    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join(EXTRACTED_DIR)
    }

    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    /// Create the folders the service writes into.
    ///
    /// # Errors
    ///
    /// Returns an error if a folder cannot be created.
    pub async fn ensure_layout(&self) -> Result<(), StorageError> {
        for dir in [self.invoice_dir(), self.extracted_dir(), self.results_dir()] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        debug!(root = %self.root.display(), "data directory ready");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    /// Store one uploaded invoice under its sanitized name, replacing any
    /// file of the same name. Returns the stored name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if nothing of the name survives
    /// sanitizing, or an I/O error.
    pub async fn save_invoice(&self, raw_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let name = sanitize_filename(raw_name).ok_or_else(|| StorageError::InvalidName(raw_name.to_string()))?;
        let path = self.invoice_dir().join(&name);
        write_atomic(&path, bytes).await?;
        info!(file = %name, size = bytes.len(), "invoice stored");
        Ok(name)
    }

    /// Invoice-type files in the invoice folder, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read.
    pub async fn invoice_paths(&self) -> Result<Vec<PathBuf>, StorageError> {
        let dir = self.invoice_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if has_extension(&name, INVOICE_EXTENSIONS) {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Describe every stored invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder or a file's metadata cannot be read.
    pub async fn list_invoices(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut files = Vec::new();
        for path in self.invoice_paths().await? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push(describe(&path, name).await?);
        }
        Ok(files)
    }

    /// Remove one stored invoice by its exact stored name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no such file exists (names that
    /// are not already sanitized can never exist), or an I/O error.
    pub async fn delete_invoice(&self, name: &str) -> Result<(), StorageError> {
        if sanitize_filename(name).as_deref() != Some(name) {
            return Err(StorageError::NotFound(name.to_string()));
        }
        match tokio::fs::remove_file(self.invoice_dir().join(name)).await {
            Ok(()) => {
                info!(file = %name, "invoice deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every regular file in the invoice folder. Returns how many went.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be listed. Individual files that
    /// fail to delete are logged and skipped.
    pub async fn clear_invoices(&self) -> Result<usize, StorageError> {
        let dir = self.invoice_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to delete invoice"),
            }
        }
        info!(removed, "invoice folder cleared");
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Statement
    // -------------------------------------------------------------------------

    /// Replace the stored supplier statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save_statement(&self, bytes: &[u8]) -> Result<(), StorageError> {
        write_atomic(&self.statement_path(), bytes).await?;
        info!(size = bytes.len(), "supplier statement stored");
        Ok(())
    }

    /// Describe the stored statement, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but its metadata cannot be read.
    pub async fn statement_info(&self) -> Result<Option<StoredFile>, StorageError> {
        match describe(&self.statement_path(), STATEMENT_FILE.to_string()).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Raw bytes of the stored statement, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_statement(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(read_optional(&self.statement_path()).await?)
    }

    // -------------------------------------------------------------------------
    // Run outputs
    // -------------------------------------------------------------------------

    /// Write `bytes` as the next free member of the `base` sequence in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read or the file written.
    pub async fn write_next(&self, dir: &Path, base: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(dir).await?;
        let mut index = 0;
        let path = loop {
            let candidate = dir.join(sequence_name(base, index));
            if !tokio::fs::try_exists(&candidate).await? {
                break candidate;
            }
            index += 1;
        };
        write_atomic(&path, bytes).await?;
        Ok(path)
    }

    /// The highest-indexed member of the `base` sequence in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder exists but cannot be read.
    pub async fn latest(&self, dir: &Path, base: &str) -> Result<Option<PathBuf>, StorageError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut best: Option<(u32, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(index) = sequence_index(&name, base) else {
                continue;
            };
            if best.as_ref().is_none_or(|(current, _)| index > *current) {
                best = Some((index, entry.path()));
            }
        }
        Ok(best.map(|(_, path)| path))
    }

    /// Read the newest run output of the `base` sequence in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder or file cannot be read.
    pub async fn read_latest(&self, dir: &Path, base: &str) -> Result<Option<(PathBuf, Vec<u8>)>, StorageError> {
        let Some(path) = self.latest(dir, base).await? else {
            return Ok(None);
        };
        Ok(read_optional(&path).await?.map(|bytes| (path, bytes)))
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
