//! Error types for the store.

use std::path::PathBuf;

use rusqlite::types::FromSqlError;
use thiserror::Error;

/// Errors that can occur while initializing or using the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The parent directory of the database file could not be created.
    #[error("failed to create database directory {}: {source}", path.display())]
    CreateDirectory {
        /// Directory that was being created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The database file could not be opened or is not usable.
    #[error("failed to open database at {}: {source}", path.display())]
    Open {
        /// Path that was being opened.
        path: PathBuf,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// A pragma was rejected while strict pragma checking was enabled.
    #[error("failed to apply pragma '{name}': {source}")]
    Pragma {
        /// Name of the rejected pragma.
        name: &'static str,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// A statement failed. The engine's error is passed through unchanged.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The store has been closed.
    #[error("database connection is closed")]
    Closed,

    /// A previous call panicked while holding the handle.
    #[error("database handle lock poisoned")]
    Poisoned,

    /// The blocking task running a call panicked or was cancelled.
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A row has no column with the requested name or index.
    #[error("no such column: {0}")]
    NoSuchColumn(String),

    /// A column value could not be converted to the requested type.
    #[error("cannot convert column '{column}': {source}")]
    Conversion {
        /// Name of the column being read.
        column: String,
        /// The underlying conversion error.
        source: FromSqlError,
    },
}

impl StoreError {
    /// The SQLite error code behind this error, if any.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Self::Open { source, .. } | Self::Pragma { source, .. } | Self::Sqlite(source) => {
                source.sqlite_error_code()
            }
            _ => None,
        }
    }

    /// Whether the engine reported lock contention (`SQLITE_BUSY` / `SQLITE_LOCKED`).
    pub fn is_busy(&self) -> bool {
        matches!(
            self.sqlite_code(),
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
        )
    }
}
