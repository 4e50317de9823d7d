//! Storage path resolution and data directory setup.

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::mode::DeploymentMode;

/// Data directory used in production.
pub const PRODUCTION_DATA_DIR: &str = "/app/data";

/// Database file used in production.
pub const PRODUCTION_DB_PATH: &str = "/app/data/academic.db";

/// Database file used outside production, relative to the working directory.
pub const LOCAL_DB_PATH: &str = "academic.db";

/// Returns the database path for `mode`. Pure and deterministic.
pub fn resolve_path(mode: DeploymentMode) -> PathBuf {
    match mode {
        DeploymentMode::Production => PathBuf::from(PRODUCTION_DB_PATH),
        DeploymentMode::Other => PathBuf::from(LOCAL_DB_PATH),
    }
}

/// Creates the parent directory of `db_path`, including missing
/// intermediate directories. An existing directory is left untouched.
///
/// # Errors
///
/// Returns `StoreError::CreateDirectory` if the directory cannot be created.
pub fn ensure_directory(db_path: &Path) -> Result<(), StoreError> {
    let Some(dir) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        return Ok(());
    };

    if dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "database directory already exists");
        return Ok(());
    }

    std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    tracing::info!(dir = %dir.display(), "created database directory");
    Ok(())
}
