//! Owned parameter lists and result rows for the store accessors.
//!
//! Accessor work runs on the blocking pool, so both directions are fully
//! owned: [`Params`] moves into the blocking task and [`Row`]s move back out.

use std::sync::Arc;

use rusqlite::types::{FromSql, Value, ValueRef};

use crate::error::StoreError;

/// Positional parameters bound to `?` / `?N` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one value.
    pub fn push(&mut self, value: impl IntoSqlValue) {
        self.0.push(value.into_sql_value());
    }

    /// Converts a single argument for [`sql_params!`](crate::sql_params).
    pub fn value_of(value: impl IntoSqlValue) -> Value {
        value.into_sql_value()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Conversion into an owned SQLite value.
pub trait IntoSqlValue {
    fn into_sql_value(self) -> Value;
}

macro_rules! integer_into_sql_value {
    ($($ty:ty),*) => {
        $(
            impl IntoSqlValue for $ty {
                fn into_sql_value(self) -> Value {
                    Value::Integer(i64::from(self))
                }
            }
        )*
    };
}

integer_into_sql_value!(i8, i16, i32, i64, u8, u16, u32, bool);

impl IntoSqlValue for f32 {
    fn into_sql_value(self) -> Value {
        Value::Real(f64::from(self))
    }
}

impl IntoSqlValue for f64 {
    fn into_sql_value(self) -> Value {
        Value::Real(self)
    }
}

impl IntoSqlValue for String {
    fn into_sql_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoSqlValue for &str {
    fn into_sql_value(self) -> Value {
        Value::Text(self.to_owned())
    }
}

impl IntoSqlValue for &String {
    fn into_sql_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoSqlValue for Vec<u8> {
    fn into_sql_value(self) -> Value {
        Value::Blob(self)
    }
}

impl IntoSqlValue for &[u8] {
    fn into_sql_value(self) -> Value {
        Value::Blob(self.to_vec())
    }
}

impl IntoSqlValue for Value {
    fn into_sql_value(self) -> Value {
        self
    }
}

impl<T: IntoSqlValue> IntoSqlValue for Option<T> {
    fn into_sql_value(self) -> Value {
        match self {
            Some(value) => value.into_sql_value(),
            None => Value::Null,
        }
    }
}

/// A single result row: column names paired with their values.
///
/// Rows from the same query share one column-name list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw values in select order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of the named column, if present.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.index_of(column).map(|idx| &self.values[idx])
    }

    /// Typed value of the named column.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchColumn` if the row has no such column, or
    /// `StoreError::Conversion` if the stored value cannot be read as `T`.
    pub fn get<T: FromSql>(&self, column: &str) -> Result<T, StoreError> {
        let idx = self
            .index_of(column)
            .ok_or_else(|| StoreError::NoSuchColumn(column.to_string()))?;
        self.get_idx(idx)
    }

    /// Typed value at a zero-based column index.
    ///
    /// # Errors
    ///
    /// Same as [`Row::get`].
    pub fn get_idx<T: FromSql>(&self, idx: usize) -> Result<T, StoreError> {
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| StoreError::NoSuchColumn(idx.to_string()))?;
        T::column_result(ValueRef::from(value)).map_err(|source| StoreError::Conversion {
            column: self.columns[idx].clone(),
            source,
        })
    }

    /// Renders the row as a JSON object keyed by column name.
    ///
    /// Blobs become arrays of byte values; non-finite reals become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }

    // Duplicate column names resolve to the first occurrence, as in SQLite.
    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(b) => serde_json::Value::from(b.clone()),
    }
}
