//! Payment service trait and in-memory implementation.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::EntityId;
use workflow::TransactionHandle;

use super::{AccountHolder, CreateAccountHolder};
use crate::error::CommerceError;
use crate::store::MemoryDatabase;

/// Payment module operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Creates an account holder at the payment provider.
    async fn create_account_holder(
        &self,
        tx: Option<&TransactionHandle>,
        data: CreateAccountHolder,
    ) -> Result<AccountHolder, CommerceError>;

    /// Deletes an account holder. Deleting an unknown id is a no-op.
    async fn delete_account_holder(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<(), CommerceError>;

    async fn retrieve_account_holder(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<AccountHolder, CommerceError>;

    async fn list_account_holders(
        &self,
        tx: Option<&TransactionHandle>,
    ) -> Result<Vec<AccountHolder>, CommerceError>;
}

/// In-memory payment service.
pub struct MemoryPaymentService {
    db: MemoryDatabase,
    fail_on_create: AtomicBool,
}

impl MemoryPaymentService {
    pub fn new(db: MemoryDatabase) -> Self {
        Self {
            db,
            fail_on_create: AtomicBool::new(false),
        }
    }

    /// Makes the provider reject account holder creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentService for MemoryPaymentService {
    #[tracing::instrument(skip(self, tx, data), fields(provider_id = %data.provider_id))]
    async fn create_account_holder(
        &self,
        tx: Option<&TransactionHandle>,
        data: CreateAccountHolder,
    ) -> Result<AccountHolder, CommerceError> {
        if data.provider_id.trim().is_empty() {
            return Err(CommerceError::Invalid("provider_id is required".into()));
        }
        if data.customer_id.trim().is_empty() {
            return Err(CommerceError::Invalid("customer_id is required".into()));
        }
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(CommerceError::Provider(format!(
                "provider {} rejected the account holder",
                data.provider_id
            )));
        }

        let holder = AccountHolder {
            id: EntityId::generate("acchld").to_string(),
            external_id: EntityId::generate("ext").to_string(),
            provider_id: data.provider_id,
            customer_id: data.customer_id,
            email: data.email,
            data: data.data,
            created_at: Utc::now(),
        };

        self.db
            .write(tx, |tables| {
                let taken = tables.account_holders.values().any(|existing| {
                    existing.provider_id == holder.provider_id
                        && existing.customer_id == holder.customer_id
                });
                if taken {
                    return Err(CommerceError::Conflict(format!(
                        "customer {} already has an account holder at {}",
                        holder.customer_id, holder.provider_id
                    )));
                }
                tables
                    .account_holders
                    .insert(holder.id.clone(), holder.clone());
                Ok(())
            })
            .await?;

        tracing::info!(account_holder_id = %holder.id, "Account holder created");
        Ok(holder)
    }

    #[tracing::instrument(skip(self, tx))]
    async fn delete_account_holder(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<(), CommerceError> {
        self.db
            .write(tx, |tables| {
                tables.account_holders.remove(id);
                Ok(())
            })
            .await
    }

    async fn retrieve_account_holder(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<AccountHolder, CommerceError> {
        self.db
            .read(tx, |tables| tables.account_holders.get(id).cloned())
            .await?
            .ok_or_else(|| CommerceError::not_found("Account holder", id))
    }

    async fn list_account_holders(
        &self,
        tx: Option<&TransactionHandle>,
    ) -> Result<Vec<AccountHolder>, CommerceError> {
        self.db
            .read(tx, |tables| tables.account_holders.values().cloned().collect())
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(customer: &str) -> CreateAccountHolder {
        CreateAccountHolder {
            provider_id: "pp_stripe".into(),
            customer_id: customer.into(),
            email: Some("jane@example.com".into()),
            data: json!({ "plan": "basic" }),
        }
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let service = MemoryPaymentService::new(MemoryDatabase::new());

        let holder = service
            .create_account_holder(None, request("cus_1"))
            .await
            .unwrap();
        assert!(holder.id.starts_with("acchld_"));
        assert_eq!(
            service.retrieve_account_holder(None, &holder.id).await.unwrap(),
            holder
        );

        service.delete_account_holder(None, &holder.id).await.unwrap();
        assert!(service.list_account_holders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_customer_conflicts() {
        let service = MemoryPaymentService::new(MemoryDatabase::new());
        service
            .create_account_holder(None, request("cus_1"))
            .await
            .unwrap();

        let err = service
            .create_account_holder(None, request("cus_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let service = MemoryPaymentService::new(MemoryDatabase::new());
        service.set_fail_on_create(true);

        let err = service
            .create_account_holder(None, request("cus_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Provider(_)));
        assert!(service.list_account_holders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop() {
        let service = MemoryPaymentService::new(MemoryDatabase::new());
        assert!(service.delete_account_holder(None, "acchld_x").await.is_ok());
    }
}
