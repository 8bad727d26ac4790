//! Core traits for dbkit

mod bind;
mod driver;
mod from_value;
mod record;
mod to_value;
mod transaction;

pub use bind::{Bind, ScanTarget, Shape, Slot};
pub(crate) use driver::timed;
pub use driver::{ColumnInfo, Driver, ExecuteResult, Rows, ScanKind};
pub use from_value::{coerce, coerce_bytes, FromValue};
pub use record::{FieldDef, Record};
pub use to_value::ToValue;
pub use transaction::{IsolationLevel, Transaction, Transactional};
