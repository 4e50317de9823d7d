//! Startup host for the academic records application.
//!
//! Loads configuration, runs the database startup sequence once, keeps the
//! store open until the process is asked to stop, then closes it.

pub mod config;

use academic_db::{PragmaReport, Store, StoreError};
use config::Config;
use thiserror::Error;

/// Errors that stop the host.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The database could not be initialized. Always fatal.
    #[error("database initialization failed: {0}")]
    Database(#[from] StoreError),
}

/// Runs the database startup sequence described by `config`.
///
/// # Errors
///
/// Returns `StoreError` if the data directory cannot be created or the
/// database cannot be opened.
pub fn open_store(config: &Config) -> Result<Store, StoreError> {
    let store = Store::initialize(config.deployment_mode(), config.store_options())?;
    log_pragma_report(store.pragma_report());
    Ok(store)
}

fn log_pragma_report(report: &PragmaReport) {
    if report.all_applied() {
        tracing::info!(pragmas = ?report.names(), "database configured");
        return;
    }
    for outcome in report.failures() {
        tracing::warn!(
            pragma = outcome.name,
            requested = %outcome.requested,
            error = outcome.error.as_deref().unwrap_or("unknown"),
            "database running with engine default"
        );
    }
}

/// Opens the store, waits for a shutdown signal, then closes the store.
///
/// # Errors
///
/// Returns `StartupError` if the store cannot be opened or fails to close.
pub async fn run(config: Config) -> Result<(), StartupError> {
    let store = open_store(&config)?;
    tracing::info!(path = %store.path().display(), "database ready");

    shutdown_signal().await;

    store.close().await?;
    tracing::info!("academic host shut down");
    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
