/// Database layer for Runbook
///
/// # Modules
///
/// - `pool`: SQLite connection pool management with health checks
/// - `migrations`: embedded migration runner
/// - Models are in the `models` module at crate root level
///
/// [`with_transaction`] runs one logical operation (a change plus its audit
/// entry) atomically.
///
/// # Example
///
/// ```no_run
/// use runbook_core::db::{pool::{create_pool, DatabaseConfig}, with_transaction};
/// use runbook_core::models::user::User;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let count = with_transaction(&pool, |conn| {
///     Box::pin(async move { Ok(User::count(&mut *conn).await?) })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```

pub mod migrations;
pub mod pool;

use sqlx::{SqliteConnection, SqlitePool};
use std::future::Future;
use std::pin::Pin;

use crate::error::{Error, Result};

/// Future returned by a [`with_transaction`] body
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'c>>;

/// Executes a closure within a database transaction
///
/// Begins an `IMMEDIATE` transaction, hands the closure its connection, and
/// commits if the closure returns `Ok`. On `Err` the transaction is rolled back and the
/// closure's error is returned unchanged.
///
/// The write lock is taken at `BEGIN`, so a second writer waits on the busy
/// timeout and then reads the first writer's committed state instead of
/// failing with `SQLITE_BUSY` when it upgrades a read lock.
///
/// The closure must not capture borrowed data; move owned values (ids,
/// cloned policies) into it.
pub async fn with_transaction<T, F>(pool: &SqlitePool, f: F) -> Result<T>
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> TxFuture<'c, T>,
{
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await.map_err(|e| {
        tracing::error!(error = %e, "Failed to begin transaction");
        Error::Database(e)
    })?;

    match f(&mut *tx).await {
        Ok(result) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to commit transaction");
                Error::Database(e)
            })?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %e,
                    "Failed to rollback transaction"
                );
            } else {
                tracing::debug!(error = %e, "Transaction rolled back");
            }
            Err(e)
        }
    }
}
