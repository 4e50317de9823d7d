//! Lifecycle observers for the database handle.

use std::path::Path;

use rusqlite::ErrorCode;

/// Receives handle-level lifecycle events.
///
/// Observers only watch: they cannot restart the handle or alter the call
/// that triggered them, and the failing call still receives its error.
pub trait LifecycleObserver: Send + Sync {
    /// Called when an operation fails in a way that points at the handle
    /// itself rather than the statement (see [`is_handle_failure`]).
    fn on_error(&self, path: &Path, error: &rusqlite::Error);

    /// Called exactly once, when the handle closes.
    fn on_close(&self, path: &Path);
}

/// Default observer: writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl LifecycleObserver for LogObserver {
    fn on_error(&self, path: &Path, error: &rusqlite::Error) {
        tracing::error!(path = %path.display(), error = %error, "database error");
    }

    fn on_close(&self, path: &Path) {
        tracing::info!(path = %path.display(), "database connection closed");
    }
}

/// Whether `error` is a fault of the handle (I/O, corruption, full disk)
/// rather than of the statement that hit it.
pub fn is_handle_failure(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(
            ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::DiskFull
                | ErrorCode::CannotOpen
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn io_and_corruption_are_handle_failures() {
        assert!(is_handle_failure(&sqlite_failure(rusqlite::ffi::SQLITE_IOERR)));
        assert!(is_handle_failure(&sqlite_failure(rusqlite::ffi::SQLITE_CORRUPT)));
        assert!(is_handle_failure(&sqlite_failure(rusqlite::ffi::SQLITE_FULL)));
        assert!(is_handle_failure(&sqlite_failure(rusqlite::ffi::SQLITE_NOTADB)));
    }

    #[test]
    fn statement_errors_are_not_handle_failures() {
        assert!(!is_handle_failure(&sqlite_failure(rusqlite::ffi::SQLITE_ERROR)));
        assert!(!is_handle_failure(&sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT)));
        assert!(!is_handle_failure(&sqlite_failure(rusqlite::ffi::SQLITE_BUSY)));
        assert!(!is_handle_failure(&rusqlite::Error::QueryReturnedNoRows));
    }
}
