//! Unit of work: one store connection plus its persistence context.

use tracing::{debug, warn};

use dataquery_core::error::AppError;
use dataquery_core::result::AppResult;
use dataquery_core::traits::{Store, StoreConnection};
use dataquery_core::types::{Dialect, Row, Statement};

use crate::context::PersistenceContext;

/// A connection to a store with the entity state loaded through it.
///
/// Transactional sessions end with [`Session::commit`] or
/// [`Session::rollback`]; dropping one without either rolls back.
pub struct Session {
    connection: Box<dyn StoreConnection>,
    dialect: Dialect,
    context: PersistenceContext,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect)
            .field("in_transaction", &self.connection.in_transaction())
            .field("known_entities", &self.context.len())
            .finish()
    }
}

impl Session {
    /// Open a session without a transaction.
    pub async fn open<S: Store + ?Sized>(store: &S) -> AppResult<Self> {
        let connection = store.connect().await?;
        Ok(Self::with_connection(connection, store.dialect()))
    }

    /// Open a session and start a transaction.
    pub async fn begin<S: Store + ?Sized>(store: &S) -> AppResult<Self> {
        let connection = store.begin().await?;
        debug!("Transaction started");
        Ok(Self::with_connection(connection, store.dialect()))
    }

    /// Wrap an already acquired connection.
    pub fn with_connection(connection: Box<dyn StoreConnection>, dialect: Dialect) -> Self {
        Self {
            connection,
            dialect,
            context: PersistenceContext::new(),
        }
    }

    /// SQL flavour of the underlying store.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.connection.in_transaction()
    }

    /// Entity state loaded so far.
    pub fn context(&self) -> &PersistenceContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut PersistenceContext {
        &mut self.context
    }

    /// Forget all loaded entity state.
    pub fn clear(&mut self) {
        self.context.clear();
    }

    /// Commit the transaction.
    pub async fn commit(mut self) -> AppResult<()> {
        self.connection.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Roll the transaction back.
    pub async fn rollback(mut self) -> AppResult<()> {
        if let Err(e) = self.connection.rollback().await {
            warn!(error = %e, "Transaction rollback failed");
            return Err(e);
        }
        debug!("Transaction rolled back");
        Ok(())
    }

    fn trace(statement: &Statement) {
        debug!(
            descriptor = statement.source.as_deref().unwrap_or("-"),
            sql = %statement.sql,
            binds = statement.binds.len(),
            "Executing statement"
        );
    }

    fn annotate(statement: &Statement, err: AppError) -> AppError {
        match &statement.source {
            Some(name) => err.in_descriptor(name.as_str()),
            None => err,
        }
    }

    pub(crate) async fn fetch(&mut self, statement: &Statement) -> AppResult<Vec<Row>> {
        Self::trace(statement);
        self.connection
            .execute(statement)
            .await
            .map_err(|e| Self::annotate(statement, e))
    }

    pub(crate) async fn count(&mut self, statement: &Statement) -> AppResult<i64> {
        Self::trace(statement);
        self.connection
            .execute_count(statement)
            .await
            .map_err(|e| Self::annotate(statement, e))
    }

    pub(crate) async fn bulk(&mut self, statement: &Statement) -> AppResult<u64> {
        Self::trace(statement);
        self.connection
            .execute_bulk(statement)
            .await
            .map_err(|e| Self::annotate(statement, e))
    }
}
