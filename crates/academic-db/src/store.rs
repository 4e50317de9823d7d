//! The shared database handle and its async accessors.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Batch, Connection, OpenFlags, Statement};

use crate::error::StoreError;
use crate::mode::DeploymentMode;
use crate::observer::{is_handle_failure, LifecycleObserver, LogObserver};
use crate::path::{ensure_directory, resolve_path};
use crate::pragma::{configure, PragmaReport, PragmaSettings};
use crate::row::{Params, Row};

const MEMORY_PATH: &str = ":memory:";

/// Options for opening a [`Store`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Database file to use instead of the one resolved from the
    /// deployment mode. Only consulted by [`Store::initialize`].
    pub path: Option<PathBuf>,

    /// Startup pragma tunables.
    pub pragmas: PragmaSettings,

    /// Receives error and close events for the handle.
    pub observer: Arc<dyn LifecycleObserver>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            path: None,
            pragmas: PragmaSettings::default(),
            observer: Arc::new(LogObserver),
        }
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("path", &self.path)
            .field("pragmas", &self.pragmas)
            .finish_non_exhaustive()
    }
}

/// The process-wide database handle.
///
/// Clones share the same connection. Calls from any number of tasks are
/// accepted and run one at a time against the handle on tokio's blocking
/// pool. A call that has been issued runs to completion even if its future
/// is dropped.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    observer: Arc<dyn LifecycleObserver>,
    pragma_report: PragmaReport,
}

impl Store {
    /// Runs the startup sequence for `mode`: resolve the path (unless
    /// `options.path` overrides it), create the data directory in
    /// production, then [`Store::open`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CreateDirectory` or any error from
    /// [`Store::open`]. Either is fatal for the process.
    pub fn initialize(mode: DeploymentMode, options: StoreOptions) -> Result<Self, StoreError> {
        let path = options.path.clone().unwrap_or_else(|| resolve_path(mode));
        tracing::info!(mode = %mode, path = %path.display(), "initializing database");

        if mode.is_production() {
            if let Err(e) = ensure_directory(&path) {
                tracing::error!(error = %e, "database directory unavailable");
                return Err(e);
            }
        }

        Self::open(path, options)
    }

    /// Opens (creating if absent) the database at `path` and applies the
    /// startup pragmas before returning.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Open` if the file cannot be opened or is not a
    /// usable database, or `StoreError::Pragma` when strict pragma checking
    /// is enabled and a pragma is rejected. No retry is attempted.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = match open_handle(&path) {
            Ok(conn) => conn,
            Err(source) => {
                tracing::error!(path = %path.display(), error = %source, "database connection failed");
                return Err(StoreError::Open { path, source });
            }
        };
        tracing::info!(path = %path.display(), "database connected");
        Self::from_connection(path, conn, options)
    }

    /// Opens a private in-memory database with the same startup sequence.
    ///
    /// # Errors
    ///
    /// Same as [`Store::open`].
    pub fn open_in_memory(options: StoreOptions) -> Result<Self, StoreError> {
        let path = PathBuf::from(MEMORY_PATH);
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = MEMORY_PATH, "database connected");
        Self::from_connection(path, conn, options)
    }

    fn from_connection(
        path: PathBuf,
        conn: Connection,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let pragma_report = configure(&conn, &options.pragmas)?;
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                conn: Mutex::new(Some(conn)),
                observer: options.observer,
                pragma_report,
            }),
        })
    }

    /// Path of the database file (`:memory:` for in-memory stores).
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Outcomes of the startup pragmas, in the order they were issued.
    pub fn pragma_report(&self) -> &PragmaReport {
        &self.inner.pragma_report
    }

    pub fn is_closed(&self) -> bool {
        match self.inner.conn.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Runs one statement for its side effects. Rows it yields, if any, are
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns the engine's error unchanged as `StoreError::Sqlite`, or
    /// `StoreError::Closed` after [`Store::close`]. SQL holding more than one
    /// statement is refused with `rusqlite::Error::MultipleStatement` and
    /// nothing is run.
    pub async fn execute(&self, sql: impl Into<String>, params: Params) -> Result<(), StoreError> {
        let sql = sql.into();
        self.call(move |conn| run_statement(conn, &sql, &params)).await
    }

    /// Returns the first row of the result, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Same as [`Store::execute`]. An empty result is not an error.
    pub async fn fetch_one(
        &self,
        sql: impl Into<String>,
        params: Params,
    ) -> Result<Option<Row>, StoreError> {
        let sql = sql.into();
        self.call(move |conn| {
            query_rows(conn, &sql, &params, Some(1)).map(|rows| rows.into_iter().next())
        })
        .await
    }

    /// Returns every row of the result, in the order the engine yields them.
    ///
    /// # Errors
    ///
    /// Same as [`Store::execute`].
    pub async fn fetch_all(&self, sql: impl Into<String>, params: Params) -> Result<Vec<Row>, StoreError> {
        let sql = sql.into();
        self.call(move |conn| query_rows(conn, &sql, &params, None)).await
    }

    /// Runs `f` against the raw connection.
    ///
    /// # Errors
    ///
    /// Returns the closure's error as `StoreError::Sqlite`,
    /// `StoreError::Closed` after [`Store::close`], or `StoreError::Task`
    /// if the closure panics.
    pub async fn call<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.run(f)).await?
    }

    /// Closes the handle. Later calls on this store or any clone fail with
    /// `StoreError::Closed`. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if SQLite refuses to close; the handle
    /// then stays open.
    pub async fn close(&self) -> Result<(), StoreError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.close()).await?
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        f(conn).map_err(|err| {
            if is_handle_failure(&err) {
                self.observer.on_error(&self.path, &err);
            }
            StoreError::Sqlite(err)
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let Some(conn) = guard.take() else {
            return Ok(());
        };
        match conn.close() {
            Ok(()) => {
                self.observer.on_close(&self.path);
                Ok(())
            }
            Err((conn, err)) => {
                *guard = Some(conn);
                self.observer.on_error(&self.path, &err);
                Err(StoreError::Sqlite(err))
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = match self.conn.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(conn) = slot.take() {
            if let Err((_, err)) = conn.close() {
                self.observer.on_error(&self.path, &err);
            }
            self.observer.on_close(&self.path);
        }
    }
}

fn open_handle(path: &Path) -> rusqlite::Result<Connection> {
    // The store's lock already serializes every use of the handle. Paths are
    // taken literally, so no URI flag.
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;

    // SQLite opens lazily; reading the header surfaces unreadable or
    // non-database files now instead of on the first query.
    conn.query_row("PRAGMA schema_version;", [], |row| row.get::<_, i64>(0))?;
    Ok(conn)
}

/// Prepares `sql`, refusing input that holds a second statement. A trailing
/// semicolon, whitespace or comment is not a statement.
fn prepare_single<'c>(conn: &'c Connection, sql: &str) -> rusqlite::Result<Statement<'c>> {
    let mut batch = Batch::new(conn, sql);
    let Some(stmt) = batch.next()? else {
        return conn.prepare(sql);
    };
    if batch.next()?.is_some() {
        return Err(rusqlite::Error::MultipleStatement);
    }
    Ok(stmt)
}

fn run_statement(conn: &Connection, sql: &str, params: &Params) -> rusqlite::Result<()> {
    let mut stmt = prepare_single(conn, sql)?;
    let mut rows = stmt.query(params_from_iter(params.as_slice()))?;
    while rows.next()?.is_some() {}
    Ok(())
}

fn query_rows(
    conn: &Connection,
    sql: &str,
    params: &Params,
    limit: Option<usize>,
) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = prepare_single(conn, sql)?;
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect();

    let mut rows = stmt.query(params_from_iter(params.as_slice()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|idx| row.get::<_, Value>(idx))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push(Row::new(Arc::clone(&columns), values));
        if limit.is_some_and(|limit| out.len() >= limit) {
            break;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql_params;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        errors: AtomicUsize,
        closes: AtomicUsize,
    }

    impl LifecycleObserver for CountingObserver {
        fn on_error(&self, _path: &Path, _error: &rusqlite::Error) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_close(&self, _path: &Path) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn options_with(observer: Arc<CountingObserver>) -> StoreOptions {
        StoreOptions {
            observer,
            ..StoreOptions::default()
        }
    }

    #[tokio::test]
    async fn execute_runs_statements_that_return_rows() {
        let store = Store::open_in_memory(StoreOptions::default()).expect("should open store");
        store
            .execute("PRAGMA user_version = 3", sql_params![])
            .await
            .expect("setter pragma should run");
        store
            .execute("PRAGMA user_version", sql_params![])
            .await
            .expect("rows are discarded, not rejected");

        let version: i64 = store
            .call(|conn| conn.query_row("PRAGMA user_version", [], |row| row.get(0)))
            .await
            .expect("should read user_version");
        assert_eq!(version, 3);
    }

    #[tokio::test]
    async fn statement_errors_do_not_reach_the_error_observer() {
        let observer = Arc::new(CountingObserver::default());
        let store = Store::open_in_memory(options_with(Arc::clone(&observer))).expect("should open store");

        let err = store
            .execute("SELECT * FROM no_such_table", sql_params![])
            .await
            .expect_err("missing table should fail");
        assert!(matches!(err, StoreError::Sqlite(_)), "unexpected error: {err:?}");
        assert_eq!(observer.errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_notifies_once_and_rejects_later_calls() {
        let observer = Arc::new(CountingObserver::default());
        let store = Store::open_in_memory(options_with(Arc::clone(&observer))).expect("should open store");
        let clone = store.clone();

        store.close().await.expect("close should succeed");
        store.close().await.expect("second close is a no-op");
        assert!(clone.is_closed());
        assert_eq!(observer.closes.load(Ordering::SeqCst), 1);

        let err = clone
            .fetch_all("SELECT 1", sql_params![])
            .await
            .expect_err("closed store should reject calls");
        assert!(matches!(err, StoreError::Closed), "unexpected error: {err:?}");

        drop(store);
        drop(clone);
        assert_eq!(observer.closes.load(Ordering::SeqCst), 1, "drop after close stays silent");
    }

    #[test]
    fn dropping_last_clone_closes_the_handle() {
        let observer = Arc::new(CountingObserver::default());
        let store = Store::open_in_memory(options_with(Arc::clone(&observer))).expect("should open store");
        let clone = store.clone();

        drop(store);
        assert_eq!(observer.closes.load(Ordering::SeqCst), 0, "a clone is still alive");
        drop(clone);
        assert_eq!(observer.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn multi_statement_sql_is_refused_without_running_any_of_it() {
        let store = Store::open_in_memory(StoreOptions::default()).expect("should open store");

        let err = store
            .execute("CREATE TABLE a (x); CREATE TABLE b (x)", sql_params![])
            .await
            .expect_err("two statements should be refused");
        assert!(
            matches!(err, StoreError::Sqlite(rusqlite::Error::MultipleStatement)),
            "unexpected error: {err:?}"
        );

        let err = store
            .fetch_all("SELECT 1; SELECT 2", sql_params![])
            .await
            .expect_err("fetch_all should refuse two statements");
        assert!(
            matches!(err, StoreError::Sqlite(rusqlite::Error::MultipleStatement)),
            "unexpected error: {err:?}"
        );

        let tables = store
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('a', 'b')",
                sql_params![],
            )
            .await
            .expect("schema query should succeed");
        assert!(tables.is_empty(), "no part of the batch may run: {tables:?}");
    }

    #[tokio::test]
    async fn trailing_semicolon_and_comment_are_not_a_second_statement() {
        let store = Store::open_in_memory(StoreOptions::default()).expect("should open store");
        store
            .execute("CREATE TABLE a (x);  -- scratch\n", sql_params![])
            .await
            .expect("single statement with trailing noise should run");

        let row = store
            .fetch_one("SELECT count(*) AS n FROM a;", sql_params![])
            .await
            .expect("query should succeed")
            .expect("count yields one row");
        assert_eq!(row.get::<i64>("n").expect("n"), 0);
    }

    #[test]
    fn open_treats_file_prefix_as_a_literal_path() {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let target = tmp.path().join("a.db");

        // Without URI parsing this names a relative directory "file:/..."
        // that does not exist, so the open fails and `target` is untouched.
        let uri = format!("file:{}", target.display());
        let err = Store::open(&uri, StoreOptions::default()).expect_err("literal path should not resolve");
        assert!(matches!(err, StoreError::Open { .. }), "unexpected error: {err:?}");
        assert!(!target.exists(), "the URI target must not be created");
    }

    #[test]
    fn in_memory_open_logs_the_connection() {
        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().expect("log buffer lock").extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let store = tracing::subscriber::with_default(subscriber, || {
            Store::open_in_memory(StoreOptions::default())
        })
        .expect("should open store");
        assert_eq!(store.path(), Path::new(MEMORY_PATH));

        let logs = String::from_utf8(captured.0.lock().expect("log buffer lock").clone())
            .expect("logs are utf-8");
        assert!(logs.contains("database connected"), "missing connect log: {logs}");
        assert!(logs.contains(MEMORY_PATH), "connect log should name the path: {logs}");
    }

    #[tokio::test]
    async fn call_panics_surface_as_task_errors() {
        let store = Store::open_in_memory(StoreOptions::default()).expect("should open store");
        let err = store
            .call(|_conn| -> rusqlite::Result<()> { panic!("boom") })
            .await
            .expect_err("panicking closure should fail");
        assert!(matches!(err, StoreError::Task(_)), "unexpected error: {err:?}");
    }
}
