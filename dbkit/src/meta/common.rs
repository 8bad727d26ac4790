use std::time::Duration;

use async_trait::async_trait;

use super::{Columns, TableMeta};
use crate::error::Result;
use crate::traits::Driver;

/// Adapter for raw SQL with no catalog.
///
/// Every column is treated as nullable and no column list is filtered.
#[derive(Debug, Clone, Default)]
pub struct CommonMeta {
    table: String,
    quote: Option<u8>,
}

impl CommonMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `'` instead of the configured default quote.
    pub fn single_quoted() -> Self {
        Self {
            table: String::new(),
            quote: Some(b'\''),
        }
    }
}

#[async_trait]
impl TableMeta for CommonMeta {
    fn name(&self) -> &'static str {
        "common"
    }

    fn quote(&self) -> u8 {
        self.quote
            .unwrap_or_else(|| crate::settings::get().quote_byte())
    }

    fn ident_quote(&self) -> Option<u8> {
        None
    }

    fn set_table(&mut self, table: &str) {
        self.table = table.trim().to_string();
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn set_timeout(&mut self, _timeout: Option<Duration>) {}

    async fn load_columns(&self, _driver: &dyn Driver, _print_sql: bool) -> Result<Columns> {
        Ok(Columns::new())
    }
}
