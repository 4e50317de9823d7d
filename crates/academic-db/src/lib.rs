//! Database layer for the academic records application.
//!
//! Opens the single SQLite handle the application runs on, applies the
//! startup pragmas, and exposes async accessors (`execute`, `fetch_one`,
//! `fetch_all`) plus raw handle access through [`Store::call`].
//!
//! # Design decisions
//!
//! - **One handle, no pool**: the whole process shares one connection. A
//!   [`Store`] is cheap to clone and every clone points at the same handle.
//! - **SQLite with WAL mode**: readers do not block the writer, and the
//!   busy timeout bounds how long a writer waits on a lock held by another
//!   process.
//! - **Best-effort pragmas**: a pragma the engine rejects is logged and
//!   skipped unless [`PragmaSettings::strict`] is set.
//! - **Explicit teardown**: [`Store::close`] releases the handle
//!   deterministically; dropping the last clone does the same.
//!
//! # Usage
//!
//! ```rust,ignore
//! use academic_db::{sql_params, DeploymentMode, Store, StoreOptions};
//!
//! let store = Store::initialize(DeploymentMode::parse("production"), StoreOptions::default())?;
//! store.execute("CREATE TABLE IF NOT EXISTS courses (code TEXT PRIMARY KEY)", sql_params![]).await?;
//! let rows = store.fetch_all("SELECT code FROM courses", sql_params![]).await?;
//! ```

mod error;
mod mode;
mod observer;
mod path;
mod pragma;
mod row;
mod store;

pub use error::StoreError;
pub use mode::{DeploymentMode, MODE_ENV_VAR, NODE_ENV_VAR};
pub use observer::{is_handle_failure, LifecycleObserver, LogObserver};
pub use path::{
    ensure_directory, resolve_path, LOCAL_DB_PATH, PRODUCTION_DATA_DIR, PRODUCTION_DB_PATH,
};
pub use pragma::{
    configure, Pragma, PragmaOutcome, PragmaReport, PragmaSettings, MAX_BUSY_TIMEOUT_MS,
};
pub use row::{IntoSqlValue, Params, Row};
pub use store::{Store, StoreOptions};

/// Re-exported so callers can build [`Params`] without depending on
/// `rusqlite` directly.
pub use rusqlite::types::Value;

/// Builds an owned positional parameter list for the store accessors.
///
/// ```rust,ignore
/// store.execute("INSERT INTO t (a, b) VALUES (?1, ?2)", sql_params![1_i64, "x"]).await?;
/// ```
#[macro_export]
macro_rules! sql_params {
    () => {
        $crate::Params::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Params::from(vec![$($crate::Params::value_of($value)),+])
    };
}
