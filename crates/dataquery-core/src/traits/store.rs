//! Store boundary: executes compiled statements against a relational store.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::row::Row;
use crate::types::statement::{Dialect, Statement};

/// A relational store.
///
/// Implementations exist for PostgreSQL (via `sqlx`) and an in-memory
/// evaluator used by tests and the demo CLI. The trait is defined here in
/// `dataquery-core` and implemented in `dataquery-database`.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug + 'static {
    /// SQL flavour statements for this store are rendered in.
    fn dialect(&self) -> Dialect;

    /// Acquire a connection outside any transaction.
    async fn connect(&self) -> AppResult<Box<dyn StoreConnection>>;

    /// Acquire a connection and start a transaction on it.
    async fn begin(&self) -> AppResult<Box<dyn StoreConnection>>;
}

/// A scoped connection, possibly inside a transaction.
///
/// Dropping a connection returns it to its pool; dropping one with an
/// open transaction rolls the transaction back.
#[async_trait]
pub trait StoreConnection: Send {
    /// Whether a transaction is open on this connection.
    fn in_transaction(&self) -> bool;

    /// Run a row-returning statement.
    async fn execute(&mut self, statement: &Statement) -> AppResult<Vec<Row>>;

    /// Run a `COUNT` statement.
    async fn execute_count(&mut self, statement: &Statement) -> AppResult<i64>;

    /// Run an insert/update/delete and return the affected row count.
    async fn execute_bulk(&mut self, statement: &Statement) -> AppResult<u64>;

    /// Commit the open transaction.
    ///
    /// Fails with `NoActiveTransaction` when none is open.
    async fn commit(&mut self) -> AppResult<()>;

    /// Roll back the open transaction.
    ///
    /// Fails with `NoActiveTransaction` when none is open.
    async fn rollback(&mut self) -> AppResult<()>;
}
