//! Table facade
//!
//! A [`Table`] ties a composer, a table-meta adapter and a driver together.
//! Clause methods consume and return the table; terminal methods (`find_*`,
//! `count`, `insert`, `update`, `delete`, `exec`, ...) consume it, run the
//! statement and bind the result.
//!
//! ```ignore
//! use dbkit::{Record, Table};
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
//! let man: Man = Table::new(&pool, "t_man").set_where("name", "x").find_one().await?;
//! let all: Vec<Man> = Table::new(&pool, "t_man").set_order_by("id DESC").find_all().await?;
//! ```

use std::collections::HashSet;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use crate::binder::{self, BindContext};
use crate::error::{Error, Result};
use crate::hook::{Hook, Hooks};
use crate::log::Logger;
use crate::meta::{self, new_meta, Columns, TableMeta};
use crate::query::{JoinKind, LikeKind, Query};
use crate::traits::{timed, Bind, Driver, ExecuteResult, Record, ScanTarget, ToValue};
use crate::value::Value;
use crate::write::Layout;

/// Everything about a table except its composer.
struct Options {
    meta: Box<dyn TableMeta>,
    tag: String,
    raw: bool,
    hooks: Hooks,
    excluded: HashSet<String>,
    projection: Option<String>,
    size_on_missing_limit: bool,
    print_sql: bool,
    timeout: Option<Duration>,
    logger: Option<Arc<dyn Logger>>,
    origin: &'static Location<'static>,
}

impl Options {
    fn bind_context<'c>(&'c self, catalog: &'c Columns) -> BindContext<'c> {
        BindContext {
            tag: &self.tag,
            catalog,
            hooks: &self.hooks,
        }
    }

    fn layout<'c>(&'c self, catalog: &'c Columns) -> Result<Layout<'c>> {
        let name = self.meta.table();
        if name.is_empty() {
            return Err(Error::TableNameUnknown);
        }
        Ok(Layout {
            meta: self.meta.as_ref(),
            table: self.meta.quote_path(name),
            tag: &self.tag,
            catalog,
            hooks: &self.hooks,
            excluded: &self.excluded,
        })
    }

    fn log_failure(&self, sql: &str, err: &Error) {
        crate::log::resolve(self.logger.as_ref()).error(format_args!(
            "({}:{}) {err}: {sql}",
            self.origin.file(),
            self.origin.line()
        ));
    }
}

/// One statement against one table.
///
/// Not safe for concurrent use; build a new table for every statement.
pub struct Table<'a> {
    driver: &'a dyn Driver,
    query: Query,
    joins: Vec<(JoinKind, String, String)>,
    opts: Options,
}

impl std::fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("adapter", &self.opts.meta.name())
            .field("table", &self.opts.meta.table())
            .field("raw", &self.opts.raw)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

macro_rules! clauses {
    ($($(#[$doc:meta])* $name:ident($($arg:ident: $ty:ty),*);)+) => {
        $(
            $(#[$doc])*
            pub fn $name(mut self, $($arg: $ty),*) -> Self {
                self.query.$name($($arg),*);
                self
            }
        )+
    };
}

impl<'a> Table<'a> {
    /// A table whose adapter comes from the installed meta factory.
    #[track_caller]
    pub fn new(driver: &'a dyn Driver, name: &str) -> Self {
        Self::with_meta(driver, name, new_meta())
    }

    /// A table using the given adapter.
    #[track_caller]
    pub fn with_meta(driver: &'a dyn Driver, name: &str, mut meta: Box<dyn TableMeta>) -> Self {
        meta.set_table(name);
        Self::build(driver, meta, "", &[], false, Location::caller())
    }

    /// A table over a raw statement. Without [`Table::name`] there is no
    /// catalog, so every column is treated as nullable.
    #[track_caller]
    pub fn raw(driver: &'a dyn Driver, template: &str, args: &[Value]) -> Self {
        Self::build(driver, new_meta(), template, args, true, Location::caller())
    }

    fn build(
        driver: &'a dyn Driver,
        meta: Box<dyn TableMeta>,
        template: &str,
        args: &[Value],
        raw: bool,
        origin: &'static Location<'static>,
    ) -> Self {
        let settings = crate::settings::get();
        let query = Query::pooled_styled(template, args, meta.style(), origin);
        Self {
            driver,
            query,
            joins: Vec::new(),
            opts: Options {
                meta,
                tag: settings.tag.clone(),
                raw,
                hooks: Hooks::new(),
                excluded: HashSet::new(),
                projection: None,
                size_on_missing_limit: false,
                print_sql: settings.print_sql,
                timeout: None,
                logger: None,
                origin,
            },
        }
    }

    /// Set or replace the table name.
    pub fn name(mut self, name: &str) -> Self {
        self.opts.meta.set_table(name);
        self
    }

    /// Replace the adapter, keeping the table name. Call before adding
    /// clauses: literals already rendered keep the old quoting.
    pub fn meta(mut self, mut meta: Box<dyn TableMeta>) -> Self {
        meta.set_table(self.opts.meta.table());
        meta.set_timeout(self.opts.timeout);
        self.query.set_style(meta.style());
        self.opts.meta = meta;
        self
    }

    /// Record tag naming the columns, `json` unless configured otherwise.
    pub fn tag(mut self, tag: &str) -> Self {
        self.opts.tag = tag.to_string();
        self
    }

    pub fn hook(mut self, column: &str, hook: Hook) -> Self {
        self.opts.hooks.insert(column.to_string(), hook);
        self
    }

    /// Leave `columns` out of generated projections and writes.
    pub fn exclude(mut self, columns: &[&str]) -> Self {
        self.opts
            .excluded
            .extend(columns.iter().map(|c| c.trim().to_string()));
        self
    }

    /// Override the generated projection.
    pub fn select(mut self, columns: &str) -> Self {
        self.opts.projection = Some(columns.trim().to_string());
        self
    }

    /// Apply page one of the default page size to `find_all` calls that set
    /// no LIMIT.
    pub fn size_on_missing_limit(mut self, enabled: bool) -> Self {
        self.opts.size_on_missing_limit = enabled;
        self
    }

    pub fn print_sql(mut self, print: bool) -> Self {
        self.opts.print_sql = print;
        self.query.set_print_log(print);
        self
    }

    /// Deadline for each driver call, catalog queries included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = Some(timeout);
        self.opts.meta.set_timeout(Some(timeout));
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.query.set_logger(logger.clone());
        self.opts.logger = Some(logger);
        self
    }

    /// Report `origin` in log lines instead of the constructor's caller.
    pub fn origin(mut self, origin: &'static Location<'static>) -> Self {
        self.query.set_origin(origin);
        self.opts.origin = origin;
        self
    }

    clauses! {
        set_where(field: &str, value: impl ToValue);
        set_where_op(field: &str, op: &str, value: impl ToValue);
        set_or_where(field: &str, value: impl ToValue);
        set_or_where_op(field: &str, op: &str, value: impl ToValue);
        set_where_args(template: &str, args: &[Value]);
        set_or_where_args(template: &str, args: &[Value]);
        set_where_in(field: &str, values: impl ToValue);
        set_like(field: &str, kind: LikeKind, value: &str);
        set_or_like(field: &str, kind: LikeKind, value: &str);
        set_between(field: &str, low: impl ToValue, high: impl ToValue);
        set_or_between(field: &str, low: impl ToValue, high: impl ToValue);
        set_group_by(columns: &str);
        set_having(template: &str, args: &[Value]);
        set_order_by(order: &str);
        set_limit(page: u64, size: u64);
        append(template: &str, args: &[Value]);
    }

    pub fn join(mut self, kind: JoinKind, table: &str, on: &str) -> Self {
        self.joins.push((kind, table.to_string(), on.to_string()));
        self
    }

    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.join(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: &str, on: &str) -> Self {
        self.join(JoinKind::Right, table, on)
    }

    async fn catalog(&self) -> Result<Arc<Columns>> {
        meta::columns(self.opts.meta.as_ref(), self.driver, self.opts.print_sql).await
    }

    fn apply_joins(&mut self) {
        for (kind, table, on) in self.joins.drain(..) {
            self.query.join(kind, &table, &on);
        }
    }

    /// Build the SELECT header unless the table is raw.
    fn prepare_select<B: Bind>(&mut self, catalog: &Columns) -> Result<()> {
        if !self.opts.raw {
            let layout = self.opts.layout(catalog)?;
            layout.select::<B>(&mut self.query, self.opts.projection.as_deref())?;
        }
        self.apply_joins();
        Ok(())
    }

    async fn fetch(&self, sql: &str, single: bool) -> Result<crate::traits::Rows> {
        let call = async {
            if single {
                self.driver.query_row(sql).await
            } else {
                self.driver.query(sql).await
            }
        };
        timed(self.opts.timeout, call).await.map_err(|err| {
            self.opts.log_failure(sql, &err);
            err
        })
    }

    async fn run(&self, sql: &str) -> Result<ExecuteResult> {
        timed(self.opts.timeout, self.driver.exec(sql))
            .await
            .map_err(|err| {
                self.opts.log_failure(sql, &err);
                err
            })
    }

    /// The first matching row; [`Error::NullRow`] when there is none.
    pub async fn find_one<B: Bind>(self) -> Result<B> {
        self.find_one_fn(|_| Ok(())).await
    }

    /// Like [`Table::find_one`], letting `callback` adjust the row first.
    pub async fn find_one_fn<B, F>(mut self, callback: F) -> Result<B>
    where
        B: Bind,
        F: FnMut(&mut B) -> Result<()>,
    {
        let catalog = self.catalog().await?;
        self.prepare_select::<B>(&catalog)?;
        if !self.opts.raw && !self.query.has_limit() {
            self.query.set_limit(1, 1);
        }
        let sql = self.query.take_sql();
        let rows = self.fetch(&sql, true).await?;
        binder::collect_one(rows, &self.opts.bind_context(&catalog), callback)
    }

    /// Every matching row. No rows is an empty vector, not an error.
    pub async fn find_all<B: Bind>(self) -> Result<Vec<B>> {
        self.find_all_fn(|_| Ok(())).await
    }

    /// Like [`Table::find_all`], calling `callback` on each row before it
    /// is kept.
    pub async fn find_all_fn<B, F>(mut self, callback: F) -> Result<Vec<B>>
    where
        B: Bind,
        F: FnMut(&mut B) -> Result<()>,
    {
        let catalog = self.catalog().await?;
        self.prepare_select::<B>(&catalog)?;
        if self.opts.size_on_missing_limit && !self.query.has_limit() {
            self.query.set_limit(1, 0);
        }
        let sql = self.query.take_sql();
        let rows = self.fetch(&sql, false).await?;
        binder::collect_all(rows, &self.opts.bind_context(&catalog), callback)
    }

    /// Hand every row to `callback` without keeping any. An error from the
    /// callback stops the iteration.
    pub async fn find_each<B, F>(mut self, callback: F) -> Result<()>
    where
        B: Bind,
        F: FnMut(B) -> Result<()>,
    {
        let catalog = self.catalog().await?;
        self.prepare_select::<B>(&catalog)?;
        let sql = self.query.take_sql();
        let rows = self.fetch(&sql, false).await?;
        binder::for_each(rows, &self.opts.bind_context(&catalog), callback)
    }

    /// Number of matching rows, ignoring ORDER BY and LIMIT.
    pub async fn count(mut self) -> Result<u64> {
        if !self.opts.raw {
            let name = self.opts.meta.table();
            if name.is_empty() {
                return Err(Error::TableNameUnknown);
            }
            let header = format!("SELECT * FROM {}", self.opts.meta.quote_path(name));
            self.query.reset_main(&header, &[]);
        }
        self.apply_joins();
        let sql = self.query.total_sql_str();
        if sql.is_empty() {
            return Err(Error::DestType("count needs a SELECT statement".to_string()));
        }
        let rows = self.fetch(&sql, true).await?;
        let (catalog, hooks) = (Columns::new(), Hooks::new());
        let ctx = BindContext {
            tag: &self.opts.tag,
            catalog: &catalog,
            hooks: &hooks,
        };
        binder::collect_one(rows, &ctx, |_| Ok(()))
    }

    async fn write<F>(mut self, build: F) -> Result<ExecuteResult>
    where
        F: FnOnce(&Layout<'_>, &mut Query) -> Result<()>,
    {
        let catalog = self.catalog().await?;
        let layout = self.opts.layout(&catalog)?;
        build(&layout, &mut self.query)?;
        let sql = self.query.take_sql();
        self.run(&sql).await
    }

    /// Insert `records` in one statement. A primary key left at zero in
    /// the first record is left out for every record.
    pub async fn insert<R: Record>(self, records: &[R]) -> Result<ExecuteResult> {
        self.write(|layout, q| layout.insert(q, records, false)).await
    }

    pub async fn insert_one<R: Record>(self, record: &R) -> Result<ExecuteResult> {
        self.insert(std::slice::from_ref(record)).await
    }

    /// Insert `records`, updating the non-key columns of rows whose key
    /// already exists.
    pub async fn upsert<R: Record>(self, records: &[R]) -> Result<ExecuteResult> {
        self.write(|layout, q| layout.insert(q, records, true)).await
    }

    /// Update from `record`, filtered by the WHERE clauses set on the table
    /// or else by the record's primary key.
    pub async fn update<R: Record>(self, record: &R) -> Result<ExecuteResult> {
        self.write(|layout, q| layout.update(q, record)).await
    }

    /// Delete rows equal to `record` on every mapped column.
    pub async fn delete<R: Record>(self, record: &R) -> Result<ExecuteResult> {
        self.write(|layout, q| layout.delete(q, record)).await
    }

    /// Delete rows matching the WHERE clauses set on the table.
    pub async fn delete_where(self) -> Result<ExecuteResult> {
        self.write(|layout, q| layout.delete_where(q)).await
    }

    /// Execute the raw statement.
    pub async fn exec(mut self) -> Result<ExecuteResult> {
        if !self.opts.raw || !self.query.has_header() {
            return Err(Error::DestType(
                "exec needs a table built with Table::raw".to_string(),
            ));
        }
        self.apply_joins();
        let sql = self.query.take_sql();
        self.run(&sql).await
    }

    /// Scan the first row into `targets`, one per column.
    pub async fn query_row_scan(mut self, targets: &mut [&mut dyn ScanTarget]) -> Result<()> {
        if !self.opts.raw {
            let name = self.opts.meta.table();
            if name.is_empty() {
                return Err(Error::TableNameUnknown);
            }
            let header = format!(
                "SELECT {} FROM {}",
                self.opts.projection.as_deref().unwrap_or("*"),
                self.opts.meta.quote_path(name)
            );
            self.query.reset_main(&header, &[]);
        }
        self.apply_joins();
        let sql = self.query.take_sql();
        let rows = self.fetch(&sql, true).await?;
        binder::scan_into(rows, targets)
    }
}
