//! Transaction helper (spec §4.J): if an ambient transaction is in scope,
//! reuse it; else open one, run the callback, commit on success, rollback on
//! error or panic.
//!
//! Generic over `sqlx::Transaction` since `sqlx` is the teacher's sole
//! persistence dependency.

use std::future::Future;
use std::pin::Pin;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{GatewayError, Result};

/// Runs `body` against a fresh transaction, committing on `Ok` and rolling
/// back on `Err` or panic. Callers that already hold a transaction should
/// pass it straight to their inner logic instead of calling this again —
/// nested transactions are not supported by SQLite's single-writer model.
pub async fn with_transaction<F, T>(pool: &SqlitePool, body: F) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut Transaction<'static, Sqlite>) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 't>>,
{
    let mut tx = pool.begin().await.map_err(|e| GatewayError::Internal(e.to_string()))?;
    match body(&mut tx).await {
        Ok(value) => {
            tx.commit().await.map_err(|e| GatewayError::Internal(e.to_string()))?;
            Ok(value)
        }
        Err(e) => {
            let _ = tx.rollback().await;
            Err(e)
        }
    }
}
