use std::time::Duration;

use async_trait::async_trait;

use super::{run_catalog_query, Columns, TableMeta};
use crate::error::{Error, Result};
use crate::escape::Dialect;
use crate::query::expand_to_string;
use crate::traits::Driver;
use crate::value::Value;

const CATALOG_SQL: &str = r#"SELECT c.column_name AS "Field", c.data_type AS "Type",
 c.is_nullable AS "Null",
 CASE WHEN tc.constraint_type = 'PRIMARY KEY' THEN 'PRI' ELSE '' END AS "Key",
 c.column_default AS "Default", '' AS "Extra"
 FROM information_schema.columns c
 LEFT JOIN information_schema.constraint_column_usage ccu
 ON ccu.table_schema = c.table_schema AND ccu.table_name = c.table_name
 AND ccu.column_name = c.column_name
 LEFT JOIN information_schema.table_constraints tc
 ON tc.constraint_schema = ccu.constraint_schema AND tc.constraint_name = ccu.constraint_name
 AND tc.constraint_type = 'PRIMARY KEY'
 WHERE c.table_schema = ? AND c.table_name = ?
 ORDER BY c.ordinal_position"#;

/// PostgreSQL family adapter: catalog from `information_schema`.
///
/// Literals are written as `E'...'` escape strings so backslash escapes
/// keep their meaning; identifiers use `"`.
#[derive(Debug, Clone, Default)]
pub struct PostgresMeta {
    schema: String,
    table: String,
    path: String,
    timeout: Option<Duration>,
}

impl PostgresMeta {
    pub fn new(schema: &str) -> Self {
        Self {
            schema: schema.trim().to_string(),
            ..Self::default()
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

#[async_trait]
impl TableMeta for PostgresMeta {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote(&self) -> u8 {
        b'\''
    }

    fn ident_quote(&self) -> Option<u8> {
        Some(b'"')
    }

    fn escape_prefix(&self) -> &'static str {
        "E"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    /// Accepts `table` or `schema.table`.
    fn set_table(&mut self, table: &str) {
        let table = table.trim();
        match table.split_once('.') {
            Some((schema, name)) => {
                self.schema = schema.trim().to_string();
                self.table = name.trim().to_string();
            }
            None => self.table = table.to_string(),
        }
        self.path = if self.table.is_empty() {
            String::new()
        } else if self.schema.is_empty() {
            self.table.clone()
        } else {
            format!("{}.{}", self.schema, self.table)
        };
    }

    fn table(&self) -> &str {
        &self.path
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    async fn load_columns(&self, driver: &dyn Driver, print_sql: bool) -> Result<Columns> {
        if self.schema.is_empty() {
            return Err(Error::AdapterUninitialised {
                adapter: "postgres",
                reason: "schema name missing",
            });
        }
        if self.table.is_empty() {
            return Err(Error::AdapterUninitialised {
                adapter: "postgres",
                reason: "table name missing",
            });
        }
        let sql = expand_to_string(
            CATALOG_SQL,
            &[
                Value::String(self.schema.clone()),
                Value::String(self.table.clone()),
            ],
            &self.style(),
        );
        run_catalog_query(driver, &sql, print_sql, self.timeout).await
    }
}
