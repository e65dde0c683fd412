//! Transaction boundary shared by the caller and the steps of a run.
//!
//! A caller that wants a run's writes to be atomic opens a transaction
//! through a [`UnitOfWork`] and passes the resulting [`TransactionHandle`] in
//! the run options. Steps read the handle from their context and use it for
//! every write. The engine itself never commits or rolls back the handle.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransactionError;

/// Identifier of an open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transaction opened by some store.
///
/// Implementations must tolerate concurrent calls: a handle is shared between
/// the caller and every step of the run.
#[async_trait]
pub trait TransactionScope: Send + Sync + 'static {
    /// Identity of the transaction.
    fn id(&self) -> TransactionId;

    /// Returns false once the transaction was committed or rolled back.
    fn is_active(&self) -> bool;

    /// Makes the transaction's writes visible.
    async fn commit(&self) -> Result<(), TransactionError>;

    /// Discards the transaction's writes.
    async fn rollback(&self) -> Result<(), TransactionError>;

    /// Exposes the concrete scope so the owning store can reach its internals.
    fn as_any(&self) -> &dyn Any;
}

/// Cloneable handle to an open transaction.
#[derive(Clone)]
pub struct TransactionHandle {
    scope: Arc<dyn TransactionScope>,
}

impl TransactionHandle {
    pub fn new<S: TransactionScope>(scope: S) -> Self {
        Self {
            scope: Arc::new(scope),
        }
    }

    pub fn from_arc(scope: Arc<dyn TransactionScope>) -> Self {
        Self { scope }
    }

    pub fn id(&self) -> TransactionId {
        self.scope.id()
    }

    pub fn is_active(&self) -> bool {
        self.scope.is_active()
    }

    pub async fn commit(&self) -> Result<(), TransactionError> {
        self.scope.commit().await
    }

    pub async fn rollback(&self) -> Result<(), TransactionError> {
        self.scope.rollback().await
    }

    /// Returns the concrete scope if it has type `T`.
    pub fn downcast_ref<T: TransactionScope>(&self) -> Option<&T> {
        self.scope.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

/// A store able to open transactions.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<TransactionHandle, TransactionError>;
}

/// Runs `f` inside a fresh transaction.
///
/// The transaction is committed when `f` succeeds and rolled back when it
/// fails. A failed rollback is logged; the error of `f` is returned either
/// way.
pub async fn within_transaction<U, F, Fut, T, E>(uow: &U, f: F) -> Result<T, E>
where
    U: UnitOfWork + ?Sized,
    F: FnOnce(TransactionHandle) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: From<TransactionError>,
{
    let tx = uow.begin().await?;
    match f(tx.clone()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    transaction_id = %tx.id(),
                    error = %rollback_err,
                    "Rollback failed"
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// Scope that only counts calls.
    #[derive(Default)]
    pub struct FakeScope {
        pub id: TransactionId,
        pub closed: AtomicBool,
        pub commits: AtomicUsize,
        pub rollbacks: AtomicUsize,
        pub fail_commit: bool,
    }

    #[async_trait]
    impl TransactionScope for FakeScope {
        fn id(&self) -> TransactionId {
            self.id
        }

        fn is_active(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        async fn commit(&self) -> Result<(), TransactionError> {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Err(TransactionError::Inactive(self.id));
            }
            if self.fail_commit {
                return Err(TransactionError::Commit {
                    id: self.id,
                    reason: "disk full".into(),
                });
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&self) -> Result<(), TransactionError> {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Err(TransactionError::Inactive(self.id));
            }
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Unit of work handing out one shared fake scope.
    pub struct FakeUnitOfWork {
        pub scope: Arc<FakeScope>,
    }

    impl FakeUnitOfWork {
        pub fn new(fail_commit: bool) -> Self {
            Self {
                scope: Arc::new(FakeScope {
                    fail_commit,
                    ..Default::default()
                }),
            }
        }
    }

    #[async_trait]
    impl UnitOfWork for FakeUnitOfWork {
        async fn begin(&self) -> Result<TransactionHandle, TransactionError> {
            Ok(TransactionHandle::from_arc(self.scope.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{FakeScope, FakeUnitOfWork};
    use super::*;

    #[tokio::test]
    async fn within_transaction_commits_on_success() {
        let uow = FakeUnitOfWork::new(false);

        let result: Result<u32, TransactionError> =
            within_transaction(&uow, |tx| async move {
                assert!(tx.is_active());
                Ok(7)
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(uow.scope.commits.load(Ordering::SeqCst), 1);
        assert_eq!(uow.scope.rollbacks.load(Ordering::SeqCst), 0);
        assert!(!uow.scope.is_active());
    }

    #[tokio::test]
    async fn within_transaction_rolls_back_on_error() {
        let uow = FakeUnitOfWork::new(false);

        let result: Result<(), TransactionError> = within_transaction(&uow, |_tx| async move {
            Err(TransactionError::Begin("nope".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(uow.scope.commits.load(Ordering::SeqCst), 0);
        assert_eq!(uow.scope.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn within_transaction_surfaces_commit_failure() {
        let uow = FakeUnitOfWork::new(true);

        let result: Result<(), TransactionError> =
            within_transaction(&uow, |_tx| async move { Ok(()) }).await;

        assert!(matches!(result, Err(TransactionError::Commit { .. })));
    }

    #[tokio::test]
    async fn handle_downcasts_to_concrete_scope() {
        let handle = TransactionHandle::new(FakeScope::default());
        assert!(handle.downcast_ref::<FakeScope>().is_some());
        assert!(format!("{handle:?}").contains("active: true"));
    }

    #[tokio::test]
    async fn double_commit_is_rejected() {
        let handle = TransactionHandle::new(FakeScope::default());
        handle.commit().await.unwrap();
        assert!(matches!(
            handle.commit().await,
            Err(TransactionError::Inactive(_))
        ));
    }
}
