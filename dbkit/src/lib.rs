//! dbkit - injection-safe SQL composer and row binder
//!
//! Statements are built as text with every argument escaped and inlined,
//! then run through a [`Driver`]. Results bind onto `#[derive(Record)]`
//! structs, string-keyed maps, scalars, or vectors of any of those.
//!
//! # Features
//!
//! - **Composer**: [`Query`] with `?`, `?d` and `?v` placeholders and
//!   separate WHERE/SET/VALUES/GROUP/HAVING/ORDER/LIMIT buffers
//! - **Table facade**: [`Table`] builds SELECT/INSERT/UPDATE/DELETE from a
//!   record type and the table catalog
//! - **Dialects**: MySQL and PostgreSQL table-meta adapters
//! - **NULL-tolerant binding**: NULL columns leave zero values behind
//!
//! # Example
//!
//! ```ignore
//! use dbkit::{MySqlPool, Record, Table};
//!
//! #[derive(Debug, Default, Record)]
//! pub struct Man {
//!     #[dbkit(json = "id")]
//!     pub id: i64,
//!     #[dbkit(json = "name")]
//!     pub name: String,
//!     #[dbkit(json = "addr")]
//!     pub addr: String,
//! }
//!
//! async fn rename(pool: &MySqlPool, id: i64) -> dbkit::Result<()> {
//!     let mut man: Man = Table::new(pool, "t_man").set_where("id", id).find_one().await?;
//!     man.name = "renamed".into();
//!     Table::new(pool, "t_man").update(&man).await?;
//!     Ok(())
//! }
//! ```

extern crate self as dbkit;

mod binder;
mod cache;
pub mod error;
pub mod escape;
pub mod fields;
pub mod helper;
pub mod hook;
mod json;
pub mod log;
pub mod meta;
pub mod mysql;
pub mod query;
pub mod settings;
mod table;
pub mod traits;
pub mod value;
mod write;

#[cfg(test)]
mod testing;

// Re-export the derive macro
pub use dbkit_derive::Record;

// Re-export main types
pub use error::{is_null_row, Error, Result};
pub use hook::Hook;
pub use json::Json;
pub use log::{Logger, StderrLogger, TracingLogger};
pub use meta::{CommonMeta, MySqlMeta, PostgresMeta, TableMeta};
pub use mysql::{MySqlPool, MySqlPoolBuilder, MySqlTransaction};
pub use query::{JoinKind, Kind, LikeKind, Query};
pub use settings::Settings;
pub use table::Table;
pub use traits::{
    Bind, ColumnInfo, Driver, ExecuteResult, FromValue, IsolationLevel, Record, Rows, ScanKind,
    ScanTarget, ToValue, Transaction, Transactional,
};
pub use value::Value;

/// Build a `&[Value]` argument list for placeholders.
///
/// ```ignore
/// let q = dbkit::Query::new("SELECT * FROM t WHERE a = ? AND b IN (?)", dbkit::params![1, vec![2, 3]]);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        &[] as &[$crate::Value]
    };
    ($($arg:expr),+ $(,)?) => {
        &[$($crate::ToValue::to_value(&$arg)),+] as &[$crate::Value]
    };
}
