mod config;
mod docintel;
mod error;
mod money;
mod routes;
mod services;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError};
use crate::docintel::InvoiceExtractor;
use crate::services::pipeline::{self, PipelineError};
use crate::services::storage::StorageError;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("data directory: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("server: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "invoice-recon", about = "Supplier invoice extraction and statement reconciliation")]
struct Cli {
    /// Root of the data directory (invoices, statement, run outputs).
    #[arg(long, env = "DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// Run the HTTP service (default).
    #[default]
    Serve,
    /// Extract every stored invoice once, reconciling if a statement exists.
    Extract,
    /// Reconcile the latest extraction against the stored statement.
    Reconcile,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "invoice-recon failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), MainError> {
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Extraction is optional: the service still lists, previews and
    // reconciles without credentials.
    let extractor: Option<Arc<dyn InvoiceExtractor>> = match docintel::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "document intelligence client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "document intelligence not configured; invoice extraction disabled");
            None
        }
    };

    let state = AppState::new(config, extractor);
    state.storage.ensure_layout().await?;

    match cli.command.unwrap_or_default() {
        Command::Serve => serve(state).await,
        Command::Extract => {
            let outcome = pipeline::process_invoices(&state).await?;
            match outcome.extraction {
                Some(run) => tracing::info!(
                    path = %run.path.display(),
                    rows = run.invoices.len(),
                    failed = run.failed_count(),
                    reconciled = outcome.reconciliation.is_some(),
                    "extraction complete"
                ),
                None => tracing::info!("no invoices to extract"),
            }
            Ok(())
        }
        Command::Reconcile => {
            let run = pipeline::reconcile_now(&state).await?;
            println!("{}", serde_json::to_string_pretty(&run.reconciliation.summary)?);
            tracing::info!(path = %run.path.display(), "reconciliation complete");
            Ok(())
        }
    }
}

async fn serve(state: AppState) -> Result<(), MainError> {
    let addr = state.config.socket_addr();
    let data_dir = state.storage.root().to_path_buf();
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, data_dir = %data_dir.display(), "invoice-recon listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
