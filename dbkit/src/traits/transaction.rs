//! Transaction traits for dbkit

use crate::error::Result;
use crate::traits::Driver;
use futures::future::BoxFuture;
use std::future::Future;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    /// Allows dirty reads, non-repeatable reads, and phantom reads.
    ReadUncommitted,

    /// Prevents dirty reads but allows non-repeatable reads and phantom reads.
    ReadCommitted,

    /// Prevents dirty reads and non-repeatable reads but allows phantom reads.
    #[default]
    RepeatableRead,

    /// Full isolation.
    Serializable,
}

/// A database transaction.
///
/// A transaction is a [`Driver`], so a `Table` runs on it unchanged:
///
/// ```ignore
/// let tx = pool.begin().await?;
/// Table::new(&tx, "orders").insert(&order).await?;
/// Table::new(&tx, "stock").set_where("sku", sku).update(&item).await?;
/// tx.commit().await?;
/// ```
pub trait Transaction: Driver {
    /// Commit the transaction, making all changes permanent.
    fn commit(&self) -> impl Future<Output = Result<()>> + Send;

    /// Roll back the transaction, discarding all changes.
    fn rollback(&self) -> impl Future<Output = Result<()>> + Send;
}

/// A driver that can begin transactions.
pub trait Transactional: Driver {
    /// The transaction type for this driver.
    type Tx: Transaction + Send + Sync;

    /// Begin a new transaction with the default isolation level.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;

    /// Begin a new transaction with the specified isolation level.
    fn begin_with(&self, level: IsolationLevel) -> impl Future<Output = Result<Self::Tx>> + Send;

    /// Run `f` inside a transaction: committed when it returns `Ok`,
    /// rolled back otherwise.
    ///
    /// ```ignore
    /// let id = pool.in_transaction(|tx| Box::pin(async move {
    ///     let res = Table::new(tx, "users").insert_one(&user).await?;
    ///     Ok(res.last_insert_id)
    /// })).await?;
    /// ```
    fn in_transaction<R, F>(&self, f: F) -> impl Future<Output = Result<R>> + Send
    where
        R: Send,
        F: for<'a> FnOnce(&'a Self::Tx) -> BoxFuture<'a, Result<R>> + Send;

    /// [`Transactional::in_transaction`] with an explicit isolation level.
    fn in_transaction_with<R, F>(
        &self,
        level: IsolationLevel,
        f: F,
    ) -> impl Future<Output = Result<R>> + Send
    where
        R: Send,
        F: for<'a> FnOnce(&'a Self::Tx) -> BoxFuture<'a, Result<R>> + Send;
}
