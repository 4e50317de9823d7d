//! Startup pragmas for the database handle.

use rusqlite::types::Value;
use rusqlite::Connection;

use crate::error::StoreError;

/// Largest busy timeout SQLite can hold.
pub const MAX_BUSY_TIMEOUT_MS: u32 = i32::MAX as u32;

/// Runtime tunables for the startup pragmas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PragmaSettings {
    /// Page cache size, as passed to `PRAGMA cache_size` (pages when
    /// positive, KiB when negative).
    pub cache_size: i64,

    /// Busy timeout, in milliseconds. SQLite stores it as a C `int`; values
    /// above [`MAX_BUSY_TIMEOUT_MS`] are reported back as rejected.
    pub busy_timeout_ms: u32,

    /// Fail the open on the first rejected pragma instead of logging and
    /// continuing.
    pub strict: bool,
}

impl Default for PragmaSettings {
    fn default() -> Self {
        Self {
            cache_size: 10_000,
            busy_timeout_ms: 30_000,
            strict: false,
        }
    }
}

/// One pragma directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub name: &'static str,
    pub value: String,
}

impl Pragma {
    fn new(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }

    fn statement(&self) -> String {
        format!("PRAGMA {} = {};", self.name, self.value)
    }

    /// Checks the value the engine echoed back. SQLite answers an
    /// unsupported journal mode or an out-of-range timeout with a different
    /// value instead of an error.
    fn verify(&self, reported: Option<&str>) -> rusqlite::Result<()> {
        let accepted = match self.name {
            "journal_mode" => reported.is_some_and(|mode| {
                mode.eq_ignore_ascii_case("wal") || mode.eq_ignore_ascii_case("memory")
            }),
            "busy_timeout" => reported == Some(self.value.as_str()),
            _ => true,
        };
        if accepted {
            return Ok(());
        }
        Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!(
                "{} requested {}, engine reports {}",
                self.name,
                self.value,
                reported.unwrap_or("nothing")
            )),
        ))
    }
}

impl PragmaSettings {
    /// The directives applied at open, in application order.
    pub fn directives(&self) -> [Pragma; 5] {
        [
            Pragma::new("journal_mode", "WAL"),
            Pragma::new("synchronous", "NORMAL"),
            Pragma::new("cache_size", self.cache_size),
            Pragma::new("temp_store", "MEMORY"),
            Pragma::new("busy_timeout", self.busy_timeout_ms),
        ]
    }
}

/// What happened to one directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaOutcome {
    /// Pragma name.
    pub name: &'static str,
    /// Value that was requested.
    pub requested: String,
    /// Value echoed back by the engine. Only some pragmas echo
    /// (`journal_mode`, `busy_timeout`).
    pub reported: Option<String>,
    /// Error message if the engine rejected the directive.
    pub error: Option<String>,
}

impl PragmaOutcome {
    pub fn is_applied(&self) -> bool {
        self.error.is_none()
    }
}

/// Ordered outcomes of the startup pragmas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PragmaReport {
    outcomes: Vec<PragmaOutcome>,
}

impl PragmaReport {
    pub fn outcomes(&self) -> &[PragmaOutcome] {
        &self.outcomes
    }

    /// Names in the order they were issued.
    pub fn names(&self) -> Vec<&'static str> {
        self.outcomes.iter().map(|o| o.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&PragmaOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PragmaOutcome> {
        self.outcomes.iter().filter(|o| !o.is_applied())
    }

    pub fn all_applied(&self) -> bool {
        self.outcomes.iter().all(PragmaOutcome::is_applied)
    }
}

/// Issues every directive from `settings` once, in order.
///
/// A rejected directive is logged and recorded, and the remaining ones are
/// still issued: the engine keeps its default for that setting.
///
/// # Errors
///
/// Returns `StoreError::Pragma` for the first rejected directive when
/// `settings.strict` is set. Never fails otherwise.
pub fn configure(conn: &Connection, settings: &PragmaSettings) -> Result<PragmaReport, StoreError> {
    let mut report = PragmaReport::default();

    for pragma in settings.directives() {
        let outcome = match apply(conn, &pragma) {
            Ok(reported) => {
                tracing::debug!(
                    pragma = pragma.name,
                    requested = %pragma.value,
                    reported = reported.as_deref().unwrap_or("-"),
                    "applied pragma"
                );
                PragmaOutcome {
                    name: pragma.name,
                    requested: pragma.value,
                    reported,
                    error: None,
                }
            }
            Err(source) if settings.strict => {
                tracing::error!(pragma = pragma.name, error = %source, "pragma rejected");
                return Err(StoreError::Pragma {
                    name: pragma.name,
                    source,
                });
            }
            Err(source) => {
                tracing::warn!(
                    pragma = pragma.name,
                    error = %source,
                    "pragma rejected, keeping engine default"
                );
                PragmaOutcome {
                    name: pragma.name,
                    requested: pragma.value,
                    reported: None,
                    error: Some(source.to_string()),
                }
            }
        };
        report.outcomes.push(outcome);
    }

    Ok(report)
}

// Setting pragmas may or may not produce a row, so step the statement
// instead of using `execute` (which rejects rows) or `query_row` (which
// rejects their absence).
fn apply(conn: &Connection, pragma: &Pragma) -> rusqlite::Result<Option<String>> {
    let mut stmt = conn.prepare(&pragma.statement())?;
    let mut rows = stmt.query([])?;
    let reported = match rows.next()? {
        Some(row) => Some(render(&row.get::<_, Value>(0)?)),
        None => None,
    };
    pragma.verify(reported.as_deref())?;
    Ok(reported)
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
