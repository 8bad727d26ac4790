//! MySQL transaction implementation

use crate::error::{Error, Result};
use crate::traits::{Driver, ExecuteResult, IsolationLevel, Rows, Transaction};
use async_trait::async_trait;
use mysql_async::prelude::*;
use tokio::sync::Mutex;

use super::types::fetch;

fn consumed() -> Error {
    Error::Query("transaction already consumed".to_string())
}

/// A MySQL transaction.
///
/// This wraps `mysql_async::Transaction` and implements both [`Driver`]
/// (for statements) and [`Transaction`] (for commit/rollback).
///
/// # Example
///
/// ```ignore
/// let tx = pool.begin().await?;
/// Table::new(&tx, "users").insert_one(&user).await?;
/// Table::new(&tx, "orders").insert_one(&order).await?;
/// tx.commit().await?;
/// ```
pub struct MySqlTransaction {
    // mysql_async needs &mut for every call while Driver takes &self.
    inner: Mutex<Option<mysql_async::Transaction<'static>>>,
}

impl MySqlTransaction {
    /// Create a new MySqlTransaction from a mysql_async Transaction.
    pub(crate) fn new(tx: mysql_async::Transaction<'static>) -> Self {
        Self {
            inner: Mutex::new(Some(tx)),
        }
    }

    /// Take the inner transaction, leaving None in its place.
    /// Returns an error if the transaction has already been consumed.
    async fn take_inner(&self) -> Result<mysql_async::Transaction<'static>> {
        self.inner.lock().await.take().ok_or_else(consumed)
    }
}

#[async_trait]
impl Driver for MySqlTransaction {
    async fn query(&self, sql: &str) -> Result<Rows> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(consumed)?;
        fetch(tx, sql).await
    }

    async fn exec(&self, sql: &str) -> Result<ExecuteResult> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(consumed)?;
        tx.query_drop(sql).await?;

        Ok(ExecuteResult {
            rows_affected: tx.affected_rows(),
            last_insert_id: tx.last_insert_id(),
        })
    }
}

impl Transaction for MySqlTransaction {
    async fn commit(&self) -> Result<()> {
        let tx = self.take_inner().await?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let tx = self.take_inner().await?;
        tx.rollback().await?;
        Ok(())
    }
}

/// Convert an IsolationLevel to mysql_async IsolationLevel.
pub(crate) fn to_mysql_isolation(level: IsolationLevel) -> mysql_async::IsolationLevel {
    match level {
        IsolationLevel::ReadUncommitted => mysql_async::IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted => mysql_async::IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead => mysql_async::IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable => mysql_async::IsolationLevel::Serializable,
    }
}
