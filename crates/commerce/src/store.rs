//! In-memory storage shared by the module services.
//!
//! Writes made without a transaction are applied to the committed tables at
//! once. A transaction works on its own copy of the tables taken at `begin`.
//! On commit only the rows it inserted, changed or deleted are replayed onto
//! the committed tables, so overlapping transactions and direct writes to
//! other rows all survive. Two commits touching the same row: last one wins.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use workflow::{
    TransactionError, TransactionHandle, TransactionId, TransactionScope, UnitOfWork,
};

use crate::error::CommerceError;
use crate::fulfillment::Fulfillment;
use crate::payment::AccountHolder;
use crate::pricing::{MoneyAmount, PriceList};
use crate::product::Product;

/// Every table of the database, keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub price_lists: BTreeMap<String, PriceList>,
    pub money_amounts: BTreeMap<String, MoneyAmount>,
    pub account_holders: BTreeMap<String, AccountHolder>,
    pub fulfillments: BTreeMap<String, Fulfillment>,
    pub products: BTreeMap<String, Product>,
}

/// Row-level changes of one table between two versions of it.
#[derive(Debug)]
struct TableChanges<V> {
    upserts: Vec<(String, V)>,
    deletes: Vec<String>,
}

impl<V: Clone + PartialEq> TableChanges<V> {
    fn between(base: &BTreeMap<String, V>, working: &BTreeMap<String, V>) -> Self {
        let upserts = working
            .iter()
            .filter(|(id, row)| base.get(*id) != Some(*row))
            .map(|(id, row)| (id.clone(), row.clone()))
            .collect();
        let deletes = base
            .keys()
            .filter(|id| !working.contains_key(*id))
            .cloned()
            .collect();
        Self { upserts, deletes }
    }

    fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }

    fn apply(self, table: &mut BTreeMap<String, V>) {
        for id in self.deletes {
            table.remove(&id);
        }
        table.extend(self.upserts);
    }
}

/// What a transaction did, table by table.
#[derive(Debug)]
struct ChangeSet {
    price_lists: TableChanges<PriceList>,
    money_amounts: TableChanges<MoneyAmount>,
    account_holders: TableChanges<AccountHolder>,
    fulfillments: TableChanges<Fulfillment>,
    products: TableChanges<Product>,
}

impl ChangeSet {
    fn between(base: &Tables, working: &Tables) -> Self {
        Self {
            price_lists: TableChanges::between(&base.price_lists, &working.price_lists),
            money_amounts: TableChanges::between(&base.money_amounts, &working.money_amounts),
            account_holders: TableChanges::between(
                &base.account_holders,
                &working.account_holders,
            ),
            fulfillments: TableChanges::between(&base.fulfillments, &working.fulfillments),
            products: TableChanges::between(&base.products, &working.products),
        }
    }

    fn len(&self) -> usize {
        self.price_lists.len()
            + self.money_amounts.len()
            + self.account_holders.len()
            + self.fulfillments.len()
            + self.products.len()
    }

    fn apply(self, tables: &mut Tables) {
        self.price_lists.apply(&mut tables.price_lists);
        self.money_amounts.apply(&mut tables.money_amounts);
        self.account_holders.apply(&mut tables.account_holders);
        self.fulfillments.apply(&mut tables.fulfillments);
        self.products.apply(&mut tables.products);
    }
}

/// In-memory database with copy-on-begin transactions.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    committed: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the committed tables.
    pub async fn snapshot(&self) -> Tables {
        self.committed.lock().await.clone()
    }

    /// Reads the tables visible to `tx`, or the committed tables.
    pub async fn read<R>(
        &self,
        tx: Option<&TransactionHandle>,
        f: impl FnOnce(&Tables) -> R,
    ) -> Result<R, CommerceError> {
        match tx {
            Some(handle) => {
                let scope = self.scope(handle)?;
                let working = scope.working.lock().await;
                let tables = working
                    .as_ref()
                    .ok_or(TransactionError::Inactive(scope.id))?;
                Ok(f(tables))
            }
            None => Ok(f(&*self.committed.lock().await)),
        }
    }

    /// Applies `f` to the tables visible to `tx`, or to the committed tables.
    ///
    /// `f` works on a copy: when it fails nothing is written.
    pub async fn write<R>(
        &self,
        tx: Option<&TransactionHandle>,
        f: impl FnOnce(&mut Tables) -> Result<R, CommerceError>,
    ) -> Result<R, CommerceError> {
        match tx {
            Some(handle) => {
                let scope = self.scope(handle)?;
                let mut working = scope.working.lock().await;
                let tables = working
                    .as_mut()
                    .ok_or(TransactionError::Inactive(scope.id))?;
                apply(tables, f)
            }
            None => apply(&mut *self.committed.lock().await, f),
        }
    }

    fn scope<'a>(
        &self,
        handle: &'a TransactionHandle,
    ) -> Result<&'a MemoryTransaction, TransactionError> {
        handle
            .downcast_ref::<MemoryTransaction>()
            .filter(|scope| Arc::ptr_eq(&scope.committed, &self.committed))
            .ok_or(TransactionError::Foreign(handle.id()))
    }
}

fn apply<R>(
    tables: &mut Tables,
    f: impl FnOnce(&mut Tables) -> Result<R, CommerceError>,
) -> Result<R, CommerceError> {
    let mut copy = tables.clone();
    let value = f(&mut copy)?;
    *tables = copy;
    Ok(value)
}

#[async_trait]
impl UnitOfWork for MemoryDatabase {
    async fn begin(&self) -> Result<TransactionHandle, TransactionError> {
        let base = self.committed.lock().await.clone();
        let scope = MemoryTransaction {
            id: TransactionId::new(),
            committed: Arc::clone(&self.committed),
            working: Mutex::new(Some(base.clone())),
            base,
            active: AtomicBool::new(true),
        };
        tracing::debug!(transaction_id = %scope.id, "Transaction opened");
        Ok(TransactionHandle::new(scope))
    }
}

/// A transaction of a [`MemoryDatabase`].
pub struct MemoryTransaction {
    id: TransactionId,
    committed: Arc<Mutex<Tables>>,
    working: Mutex<Option<Tables>>,
    /// The committed tables as they were at `begin`.
    base: Tables,
    active: AtomicBool,
}

impl MemoryTransaction {
    async fn take(&self) -> Result<Tables, TransactionError> {
        let tables = self
            .working
            .lock()
            .await
            .take()
            .ok_or(TransactionError::Inactive(self.id))?;
        self.active.store(false, Ordering::SeqCst);
        Ok(tables)
    }
}

#[async_trait]
impl TransactionScope for MemoryTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn commit(&self) -> Result<(), TransactionError> {
        let working = self.take().await?;
        let changes = ChangeSet::between(&self.base, &working);
        let rows = changes.len();
        changes.apply(&mut *self.committed.lock().await);
        metrics::counter!("commerce_transactions_committed_total").increment(1);
        tracing::debug!(transaction_id = %self.id, rows, "Transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        self.take().await?;
        metrics::counter!("commerce_transactions_rolled_back_total").increment(1);
        tracing::debug!(transaction_id = %self.id, "Transaction rolled back");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
