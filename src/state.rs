//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the data directory handle, the optional extraction client, the
//! progress tracker read by `/progress`, and the lock that keeps pipeline
//! runs (extraction and reconciliation) from interleaving their writes.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::docintel::InvoiceExtractor;
use crate::services::progress::ProgressTracker;
use crate::services::storage::Storage;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Storage,
    /// Optional extraction client. `None` if credentials are not configured.
    pub extractor: Option<Arc<dyn InvoiceExtractor>>,
    pub progress: ProgressTracker,
    /// Held for the duration of one pipeline run.
    pub pipeline_lock: Arc<Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, extractor: Option<Arc<dyn InvoiceExtractor>>) -> Self {
        let storage = Storage::new(config.data_dir.clone());
        Self {
            config: Arc::new(config),
            storage,
            extractor,
            progress: ProgressTracker::new(),
            pipeline_lock: Arc::new(Mutex::new(())),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
