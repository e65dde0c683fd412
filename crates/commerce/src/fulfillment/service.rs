//! Fulfillment service trait and in-memory implementation.

use async_trait::async_trait;
use workflow::TransactionHandle;

use super::{Fulfillment, UpdateFulfillment};
use crate::error::CommerceError;
use crate::store::MemoryDatabase;

/// Fulfillment module operations.
#[async_trait]
pub trait FulfillmentService: Send + Sync {
    async fn create_fulfillment(
        &self,
        tx: Option<&TransactionHandle>,
        fulfillment: Fulfillment,
    ) -> Result<Fulfillment, CommerceError>;

    async fn retrieve(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<Fulfillment, CommerceError>;

    /// Applies a partial update and returns the updated fulfillment.
    async fn update_fulfillment(
        &self,
        tx: Option<&TransactionHandle>,
        update: UpdateFulfillment,
    ) -> Result<Fulfillment, CommerceError>;

    /// Overwrites a stored fulfillment with `fulfillment`.
    async fn restore(
        &self,
        tx: Option<&TransactionHandle>,
        fulfillment: Fulfillment,
    ) -> Result<(), CommerceError>;
}

/// [`FulfillmentService`] backed by a [`MemoryDatabase`].
pub struct MemoryFulfillmentService {
    db: MemoryDatabase,
}

impl MemoryFulfillmentService {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FulfillmentService for MemoryFulfillmentService {
    async fn create_fulfillment(
        &self,
        tx: Option<&TransactionHandle>,
        fulfillment: Fulfillment,
    ) -> Result<Fulfillment, CommerceError> {
        self.db
            .write(tx, |tables| {
                if tables.fulfillments.contains_key(&fulfillment.id) {
                    return Err(CommerceError::Conflict(format!(
                        "fulfillment {} already exists",
                        fulfillment.id
                    )));
                }
                tables
                    .fulfillments
                    .insert(fulfillment.id.clone(), fulfillment.clone());
                Ok(fulfillment)
            })
            .await
    }

    async fn retrieve(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<Fulfillment, CommerceError> {
        self.db
            .read(tx, |tables| tables.fulfillments.get(id).cloned())
            .await?
            .ok_or_else(|| CommerceError::not_found("Fulfillment", id))
    }

    #[tracing::instrument(skip(self, tx, update), fields(fulfillment_id = %update.id))]
    async fn update_fulfillment(
        &self,
        tx: Option<&TransactionHandle>,
        update: UpdateFulfillment,
    ) -> Result<Fulfillment, CommerceError> {
        self.db
            .write(tx, |tables| {
                let fulfillment = tables
                    .fulfillments
                    .get_mut(&update.id)
                    .ok_or_else(|| CommerceError::not_found("Fulfillment", &update.id))?;
                update.apply_to(fulfillment);
                Ok(fulfillment.clone())
            })
            .await
    }

    #[tracing::instrument(skip(self, tx, fulfillment), fields(fulfillment_id = %fulfillment.id))]
    async fn restore(
        &self,
        tx: Option<&TransactionHandle>,
        fulfillment: Fulfillment,
    ) -> Result<(), CommerceError> {
        self.db
            .write(tx, |tables| {
                tables
                    .fulfillments
                    .insert(fulfillment.id.clone(), fulfillment);
                Ok(())
            })
            .await
    }
}
