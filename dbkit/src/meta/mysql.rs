use std::time::Duration;

use async_trait::async_trait;

use super::{run_catalog_query, Columns, TableMeta};
use crate::error::Result;
use crate::query::expand_to_string;
use crate::traits::Driver;
use crate::value::Value;

/// MySQL family adapter: catalog from `SHOW COLUMNS FROM <table>`.
#[derive(Debug, Clone, Default)]
pub struct MySqlMeta {
    table: String,
    timeout: Option<Duration>,
}

impl MySqlMeta {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableMeta for MySqlMeta {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote(&self) -> u8 {
        b'"'
    }

    fn ident_quote(&self) -> Option<u8> {
        Some(b'`')
    }

    fn set_table(&mut self, table: &str) {
        self.table = table.trim().to_string();
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn payload_escapes(&self) -> &'static [u8] {
        b"nrt"
    }

    async fn load_columns(&self, driver: &dyn Driver, print_sql: bool) -> Result<Columns> {
        let sql = expand_to_string(
            "SHOW COLUMNS FROM ?v",
            &[Value::String(self.quote_path(&self.table))],
            &self.style(),
        );
        run_catalog_query(driver, &sql, print_sql, self.timeout).await
    }
}
