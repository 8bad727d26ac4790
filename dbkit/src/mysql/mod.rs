//! MySQL driver binding

mod pool;
mod transaction;
mod types;

pub use pool::{MySqlPool, MySqlPoolBuilder};
pub use transaction::MySqlTransaction;
pub use types::from_mysql_value;
