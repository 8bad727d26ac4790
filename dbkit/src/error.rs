//! Error types for dbkit

use std::time::Duration;
use thiserror::Error;

/// Result type alias for dbkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while composing, executing or binding statements
#[derive(Error, Debug)]
pub enum Error {
    /// MySQL driver error
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// A single-row find matched no rows
    #[error("no rows in result set")]
    NullRow,

    /// The record type has no usable tagged field for the attempted write
    #[error("record {record} has no field tagged `{tag}` matching table columns")]
    StructTag { record: &'static str, tag: String },

    /// The operation needs a table name but none was given
    #[error("table name unknown; use Table::new or Table::name")]
    TableNameUnknown,

    /// The destination shape does not fit the result or the API
    #[error("destination type error: {0}")]
    DestType(String),

    /// A value could not be coerced into the destination type
    #[error("cannot convert {from} into {to}: {reason}")]
    Conversion {
        from: &'static str,
        to: &'static str,
        reason: String,
    },

    /// No rule moves this driver value into the destination
    #[error("unsupported scan, storing driver value type {from} into type {to}")]
    UnsupportedScan {
        from: &'static str,
        to: &'static str,
    },

    /// Null value for non-optional destination
    #[error("unexpected null value for {0}")]
    UnexpectedNull(&'static str),

    /// A NOT NULL column received no value and has no default
    #[error("column `{0}` is NOT NULL and has no value or default")]
    NotNullViolation(String),

    /// The table-meta adapter is missing required arguments
    #[error("{adapter} adapter is not initialised: {reason}")]
    AdapterUninitialised {
        adapter: &'static str,
        reason: &'static str,
    },

    /// Result columns that no record field maps to
    #[error("columns without matching fields: {}", .missed.join(", "))]
    FieldMismatch { missed: Vec<String> },

    /// A marshal or unmarshal hook failed
    #[error("hook for `{column}` failed: {reason}")]
    Hook { column: String, reason: String },

    /// Pooled composers cannot be cloned
    #[error("cannot clone a pooled query")]
    PooledClone,

    /// UPDATE or DELETE with no WHERE predicate and no primary key
    #[error("refusing {0} without a WHERE clause")]
    UnboundedWrite(&'static str),

    /// The driver call did not finish in time
    #[error("driver call timed out after {0:?}")]
    Timeout(Duration),

    /// Query execution error
    #[error("query error: {0}")]
    Query(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Error raised by user code, e.g. a row callback
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary error, typically from a row callback.
    pub fn custom<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Custom(err.into())
    }

    /// True when a single-row find matched nothing.
    pub fn is_null_row(&self) -> bool {
        matches!(self, Error::NullRow)
    }
}

/// Distinguish "no rows" from every other failure.
pub fn is_null_row(err: &Error) -> bool {
    err.is_null_row()
}
