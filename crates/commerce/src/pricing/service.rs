//! Price list service trait and in-memory implementation.

use async_trait::async_trait;
use workflow::TransactionHandle;

use super::{MoneyAmount, PriceList};
use crate::error::CommerceError;
use crate::store::MemoryDatabase;

/// Price list operations.
///
/// Every method works inside `tx` when one is given.
#[async_trait]
pub trait PriceListService: Send + Sync {
    /// Stores a new price list.
    async fn create_price_list(
        &self,
        tx: Option<&TransactionHandle>,
        price_list: PriceList,
    ) -> Result<PriceList, CommerceError>;

    async fn retrieve(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<PriceList, CommerceError>;

    /// Stores money amounts, replacing any amount with the same id.
    async fn upsert_prices(
        &self,
        tx: Option<&TransactionHandle>,
        prices: Vec<MoneyAmount>,
    ) -> Result<(), CommerceError>;

    /// Prices of the given products in a price list.
    async fn list_product_prices(
        &self,
        tx: Option<&TransactionHandle>,
        price_list_id: &str,
        product_ids: &[String],
    ) -> Result<Vec<MoneyAmount>, CommerceError>;

    /// Deletes money amounts by id and returns the deleted rows.
    async fn delete_prices(
        &self,
        tx: Option<&TransactionHandle>,
        ids: &[String],
    ) -> Result<Vec<MoneyAmount>, CommerceError>;

    /// Deletes every price of the given products in a price list and returns
    /// the deleted ids.
    async fn delete_product_prices(
        &self,
        tx: Option<&TransactionHandle>,
        price_list_id: &str,
        product_ids: &[String],
    ) -> Result<Vec<String>, CommerceError>;
}

/// [`PriceListService`] backed by a [`MemoryDatabase`].
pub struct MemoryPriceListService {
    db: MemoryDatabase,
}

impl MemoryPriceListService {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PriceListService for MemoryPriceListService {
    #[tracing::instrument(skip(self, tx, price_list), fields(price_list_id = %price_list.id))]
    async fn create_price_list(
        &self,
        tx: Option<&TransactionHandle>,
        price_list: PriceList,
    ) -> Result<PriceList, CommerceError> {
        if price_list.title.trim().is_empty() {
            return Err(CommerceError::Invalid("price list title is required".into()));
        }
        self.db
            .write(tx, |tables| {
                if tables.price_lists.contains_key(&price_list.id) {
                    return Err(CommerceError::Conflict(format!(
                        "price list {} already exists",
                        price_list.id
                    )));
                }
                tables
                    .price_lists
                    .insert(price_list.id.clone(), price_list.clone());
                Ok(price_list)
            })
            .await
    }

    async fn retrieve(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<PriceList, CommerceError> {
        self.db
            .read(tx, |tables| tables.price_lists.get(id).cloned())
            .await?
            .ok_or_else(|| CommerceError::not_found("Price list", id))
    }

    async fn upsert_prices(
        &self,
        tx: Option<&TransactionHandle>,
        prices: Vec<MoneyAmount>,
    ) -> Result<(), CommerceError> {
        self.db
            .write(tx, |tables| {
                for price in prices {
                    if !tables.price_lists.contains_key(&price.price_list_id) {
                        return Err(CommerceError::not_found(
                            "Price list",
                            price.price_list_id,
                        ));
                    }
                    tables.money_amounts.insert(price.id.clone(), price);
                }
                Ok(())
            })
            .await
    }

    #[tracing::instrument(skip(self, tx))]
    async fn list_product_prices(
        &self,
        tx: Option<&TransactionHandle>,
        price_list_id: &str,
        product_ids: &[String],
    ) -> Result<Vec<MoneyAmount>, CommerceError> {
        self.db
            .read(tx, |tables| {
                if !tables.price_lists.contains_key(price_list_id) {
                    return Err(CommerceError::not_found("Price list", price_list_id));
                }
                Ok(tables
                    .money_amounts
                    .values()
                    .filter(|price| {
                        price.price_list_id == price_list_id
                            && product_ids.contains(&price.product_id)
                    })
                    .cloned()
                    .collect())
            })
            .await?
    }

    #[tracing::instrument(skip(self, tx))]
    async fn delete_prices(
        &self,
        tx: Option<&TransactionHandle>,
        ids: &[String],
    ) -> Result<Vec<MoneyAmount>, CommerceError> {
        self.db
            .write(tx, |tables| {
                Ok(ids
                    .iter()
                    .filter_map(|id| tables.money_amounts.remove(id))
                    .collect())
            })
            .await
    }

    #[tracing::instrument(skip(self, tx))]
    async fn delete_product_prices(
        &self,
        tx: Option<&TransactionHandle>,
        price_list_id: &str,
        product_ids: &[String],
    ) -> Result<Vec<String>, CommerceError> {
        let ids: Vec<String> = self
            .list_product_prices(tx, price_list_id, product_ids)
            .await?
            .into_iter()
            .map(|price| price.id)
            .collect();
        self.delete_prices(tx, &ids).await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryPriceListService, PriceList) {
        let service = MemoryPriceListService::new(MemoryDatabase::new());
        let list = service
            .create_price_list(None, PriceList::new("Summer"))
            .await
            .unwrap();
        service
            .upsert_prices(
                None,
                vec![
                    MoneyAmount::new(&list.id, "prod_1", "usd", 1000),
                    MoneyAmount::new(&list.id, "prod_1", "eur", 900),
                    MoneyAmount::new(&list.id, "prod_2", "usd", 500),
                ],
            )
            .await
            .unwrap();
        (service, list)
    }

    #[tokio::test]
    async fn lists_prices_of_requested_products_only() {
        let (service, list) = seeded().await;

        let prices = service
            .list_product_prices(None, &list.id, &["prod_1".to_string()])
            .await
            .unwrap();

        assert_eq!(prices.len(), 2);
        assert!(prices.iter().all(|p| p.product_id == "prod_1"));
    }

    #[tokio::test]
    async fn unknown_price_list_is_not_found() {
        let (service, _) = seeded().await;

        let err = service
            .list_product_prices(None, "pl_missing", &["prod_1".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, CommerceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_product_prices_returns_deleted_ids() {
        let (service, list) = seeded().await;

        let ids = service
            .delete_product_prices(None, &list.id, &["prod_1".to_string()])
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        let left = service
            .list_product_prices(None, &list.id, &["prod_1".to_string(), "prod_2".to_string()])
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].product_id, "prod_2");
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let service = MemoryPriceListService::new(MemoryDatabase::new());
        let err = service
            .create_price_list(None, PriceList::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Invalid(_)));
    }
}
