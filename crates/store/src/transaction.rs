//! sqlx transactions behind the workflow transaction boundary.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use workflow::{
    TransactionError, TransactionHandle, TransactionId, TransactionScope, UnitOfWork,
};

/// Opens sqlx transactions on a pool.
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn begin(&self) -> Result<TransactionHandle, TransactionError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TransactionError::Begin(e.to_string()))?;
        let scope = PgTransaction {
            id: TransactionId::new(),
            tx: Mutex::new(Some(tx)),
            active: AtomicBool::new(true),
        };
        tracing::debug!(transaction_id = %scope.id, "Transaction opened");
        Ok(TransactionHandle::new(scope))
    }
}

/// An open sqlx transaction shared by the steps of a run.
///
/// Steps take the connection with [`PgTransaction::connection`]; the lock is
/// held only for the duration of one statement batch.
pub struct PgTransaction {
    id: TransactionId,
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
    active: AtomicBool,
}

impl PgTransaction {
    /// Locks the transaction's connection.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, PgConnection>, TransactionError> {
        let guard = self.tx.lock().await;
        MutexGuard::try_map(guard, |tx| tx.as_mut().map(|tx| &mut **tx))
            .map_err(|_| TransactionError::Inactive(self.id))
    }

    async fn take(&self) -> Result<Transaction<'static, Postgres>, TransactionError> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(TransactionError::Inactive(self.id))?;
        self.active.store(false, Ordering::SeqCst);
        Ok(tx)
    }
}

#[async_trait]
impl TransactionScope for PgTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn commit(&self) -> Result<(), TransactionError> {
        self.take()
            .await?
            .commit()
            .await
            .map_err(|e| TransactionError::Commit {
                id: self.id,
                reason: e.to_string(),
            })
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        self.take()
            .await?
            .rollback()
            .await
            .map_err(|e| TransactionError::Rollback {
                id: self.id,
                reason: e.to_string(),
            })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Returns the sqlx transaction behind `handle`.
pub fn pg_transaction(handle: &TransactionHandle) -> Result<&PgTransaction, TransactionError> {
    handle
        .downcast_ref::<PgTransaction>()
        .ok_or(TransactionError::Foreign(handle.id()))
}
