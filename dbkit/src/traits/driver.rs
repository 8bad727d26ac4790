//! Driver trait: the database connection the facade runs statements on

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::Result;
use crate::value::Value;
use async_trait::async_trait;

/// Result of a statement execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    /// Number of rows affected by the statement
    pub rows_affected: u64,
    /// Last insert ID (for INSERT statements)
    pub last_insert_id: Option<u64>,
}

/// Sentinel flavour a nullable column is read into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanKind {
    Int,
    Float,
    #[default]
    Text,
}

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Driver hint: `Some(false)` when the column is known to be NOT NULL
    pub nullable: Option<bool>,
    pub scan_kind: ScanKind,
}

impl ColumnInfo {
    /// A text column with no nullability hint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: None,
            scan_kind: ScanKind::Text,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn scan_kind(mut self, kind: ScanKind) -> Self {
        self.scan_kind = kind;
        self
    }
}

/// A fetched result set, consumed row by row.
#[derive(Debug, Clone, Default)]
pub struct Rows {
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<Value>>,
}

impl Rows {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Take the next row. Each row holds one value per column.
    pub fn next_row(&mut self) -> Option<Vec<Value>> {
        self.rows.pop_front()
    }

    /// Rows not consumed yet.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep at most `n` remaining rows.
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }
}

/// A database connection or pool.
///
/// Statements arrive fully inlined; drivers never see bind parameters.
/// Cancel a call by dropping its future.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Run a query and fetch its result set.
    async fn query(&self, sql: &str) -> Result<Rows>;

    /// Run a query expected to produce at most one row.
    async fn query_row(&self, sql: &str) -> Result<Rows> {
        let mut rows = self.query(sql).await?;
        rows.truncate(1);
        Ok(rows)
    }

    /// Execute a statement that returns no rows.
    async fn exec(&self, sql: &str) -> Result<ExecuteResult>;
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for &D {
    async fn query(&self, sql: &str) -> Result<Rows> {
        (**self).query(sql).await
    }

    async fn query_row(&self, sql: &str) -> Result<Rows> {
        (**self).query_row(sql).await
    }

    async fn exec(&self, sql: &str) -> Result<ExecuteResult> {
        (**self).exec(sql).await
    }
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for Arc<D> {
    async fn query(&self, sql: &str) -> Result<Rows> {
        (**self).query(sql).await
    }

    async fn query_row(&self, sql: &str) -> Result<Rows> {
        (**self).query_row(sql).await
    }

    async fn exec(&self, sql: &str) -> Result<ExecuteResult> {
        (**self).exec(sql).await
    }
}

/// Await `fut`, giving up after `timeout` when one is set.
pub(crate) async fn timed<T, F>(timeout: Option<std::time::Duration>, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| crate::error::Error::Timeout(limit))?,
        None => fut.await,
    }
}
