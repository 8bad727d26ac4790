//! Table-meta adapters
//!
//! An adapter knows the quoting rules of one SQL dialect and how to load
//! the column catalog of a table. Catalogs are cached process-wide per
//! adapter and table.

mod common;
mod mysql;
mod postgres;

pub use common::CommonMeta;
pub use mysql::MySqlMeta;
pub use postgres::PostgresMeta;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::binder::{collect_all, BindContext};
use crate::cache::LruCache;
use crate::error::Result;
use crate::escape::{escape_payload, quote_ident, Dialect};
use crate::hook::Hooks;
use crate::query::Style;
use crate::traits::{timed, Driver};
use crate::Record;

/// Key role of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyRole {
    #[default]
    None,
    Primary,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Column {
    pub field: String,
    pub sql_type: String,
    pub not_null: bool,
    pub key: KeyRole,
    pub default: Option<String>,
    pub extra: String,
}

impl Column {
    pub fn is_primary(&self) -> bool {
        self.key == KeyRole::Primary
    }

    /// Whether the server fills the column when it is left out, either
    /// from a default or a generated value.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.extra.to_ascii_lowercase().contains("auto_increment")
    }
}

/// Column name to catalog entry.
pub type Columns = HashMap<String, Column>;

/// Dialect plug-in.
#[async_trait]
pub trait TableMeta: Send + Sync {
    /// Adapter name, e.g. `mysql`
    fn name(&self) -> &'static str;

    /// String-literal quote byte
    fn quote(&self) -> u8;

    /// Identifier quote byte, if the dialect uses one
    fn ident_quote(&self) -> Option<u8>;

    /// Prefix for quoted literals
    fn escape_prefix(&self) -> &'static str {
        ""
    }

    /// Escape and byte-literal syntax
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn set_table(&mut self, table: &str);

    fn table(&self) -> &str;

    /// Deadline for catalog queries.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Bytes whose preceding backslash [`TableMeta::escape_payload`] doubles.
    fn payload_escapes(&self) -> &'static [u8] {
        b""
    }

    /// Post-escape for JSON text spliced into a statement verbatim.
    fn escape_payload(&self, text: &str) -> String {
        escape_payload(text, self.payload_escapes())
    }

    /// Load the catalog of the current table, bypassing the cache.
    async fn load_columns(&self, driver: &dyn Driver, print_sql: bool) -> Result<Columns>;

    /// Literal style for the composer.
    fn style(&self) -> Style {
        Style {
            quote: self.quote(),
            prefix: self.escape_prefix(),
            ident_quote: self.ident_quote(),
            dialect: self.dialect(),
        }
    }

    /// Quote an identifier, splitting on `.` for qualified names.
    fn quote_path(&self, path: &str) -> String {
        path.split('.')
            .map(|part| quote_ident(part.trim(), self.ident_quote()))
            .collect::<Vec<_>>()
            .join(".")
    }
}

type CatalogCache = LruCache<String, Arc<Columns>>;

fn catalog_cache() -> &'static CatalogCache {
    static CACHE: OnceLock<CatalogCache> = OnceLock::new();
    CACHE.get_or_init(|| LruCache::new(crate::settings::get().table_cache_size))
}

/// Cached catalog of the adapter's table. A table without a name has an
/// empty catalog.
pub async fn columns(
    meta: &dyn TableMeta,
    driver: &dyn Driver,
    print_sql: bool,
) -> Result<Arc<Columns>> {
    if meta.table().is_empty() {
        return Ok(Arc::new(Columns::new()));
    }
    let key = format!("{}:{}", meta.name(), meta.table());
    if let Some(found) = catalog_cache().get(&key) {
        return Ok(found);
    }
    let loaded = meta.load_columns(driver, print_sql).await?;
    Ok(catalog_cache().insert_if_absent(key, Arc::new(loaded)))
}

/// Result row of a catalog query. Both adapters alias their columns to
/// the `SHOW COLUMNS` names.
#[derive(Debug, Default, Record)]
pub(crate) struct CatalogRow {
    #[dbkit(json = "Field")]
    pub field: String,
    #[dbkit(json = "Type")]
    pub sql_type: String,
    #[dbkit(json = "Null")]
    pub null: String,
    #[dbkit(json = "Key")]
    pub key: String,
    #[dbkit(json = "Default")]
    pub default: Option<String>,
    #[dbkit(json = "Extra")]
    pub extra: String,
}

impl From<CatalogRow> for Column {
    fn from(row: CatalogRow) -> Self {
        Column {
            not_null: row.null.eq_ignore_ascii_case("NO"),
            key: if row.key.eq_ignore_ascii_case("PRI") {
                KeyRole::Primary
            } else {
                KeyRole::None
            },
            field: row.field,
            sql_type: row.sql_type,
            default: row.default,
            extra: row.extra,
        }
    }
}

/// Run a catalog query and merge its rows by column name. A column listed
/// more than once keeps the primary-key role if any row has it.
pub(crate) async fn run_catalog_query(
    driver: &dyn Driver,
    sql: &str,
    print_sql: bool,
    timeout: Option<Duration>,
) -> Result<Columns> {
    if print_sql {
        crate::log::logger().info(format_args!("{sql}"));
    }
    let rows = timed(timeout, driver.query(sql)).await?;
    let (catalog, hooks) = (Columns::new(), Hooks::new());
    let ctx = BindContext {
        tag: "json",
        catalog: &catalog,
        hooks: &hooks,
    };
    let list: Vec<CatalogRow> = collect_all(rows, &ctx, |_| Ok(()))?;

    let mut out = Columns::with_capacity(list.len());
    for row in list {
        let column = Column::from(row);
        match out.get_mut(&column.field) {
            Some(existing) => {
                if column.is_primary() {
                    existing.key = KeyRole::Primary;
                }
            }
            None => {
                out.insert(column.field.clone(), column);
            }
        }
    }
    Ok(out)
}

/// Builds the adapter used by `Table::new`.
pub type MetaFactory = Arc<dyn Fn() -> Box<dyn TableMeta> + Send + Sync>;

static FACTORY: OnceLock<MetaFactory> = OnceLock::new();

/// Install the process-wide adapter factory. Only the first call takes
/// effect; returns `false` otherwise.
pub fn set_meta_factory(factory: MetaFactory) -> bool {
    FACTORY.set(factory).is_ok()
}

/// A new adapter from the installed factory, MySQL by default.
pub fn new_meta() -> Box<dyn TableMeta> {
    let factory =
        FACTORY.get_or_init(|| Arc::new(|| -> Box<dyn TableMeta> { Box::new(MySqlMeta::new()) }));
    factory()
}
