//! Product service trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::EntityId;
use workflow::TransactionHandle;

use super::{
    CreateProduct, LinkKind, Product, ProductFilter, ProductLink, ProductStatus, UpdateProduct,
};
use crate::error::CommerceError;
use crate::store::MemoryDatabase;

/// Product module operations.
#[async_trait]
pub trait ProductService: Send + Sync {
    /// Creates products without any links. Returns them in input order.
    async fn create_products(
        &self,
        tx: Option<&TransactionHandle>,
        data: Vec<CreateProduct>,
    ) -> Result<Vec<Product>, CommerceError>;

    /// Deletes products for good.
    async fn delete_products(
        &self,
        tx: Option<&TransactionHandle>,
        ids: &[String],
    ) -> Result<(), CommerceError>;

    async fn attach(
        &self,
        tx: Option<&TransactionHandle>,
        kind: LinkKind,
        links: &[ProductLink],
    ) -> Result<(), CommerceError>;

    async fn detach(
        &self,
        tx: Option<&TransactionHandle>,
        kind: LinkKind,
        links: &[ProductLink],
    ) -> Result<(), CommerceError>;

    /// Retrieves a product that was not removed.
    async fn retrieve(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<Product, CommerceError>;

    async fn list(
        &self,
        tx: Option<&TransactionHandle>,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, CommerceError>;

    /// Applies partial updates and returns the updated products.
    async fn update_products(
        &self,
        tx: Option<&TransactionHandle>,
        updates: Vec<UpdateProduct>,
    ) -> Result<Vec<Product>, CommerceError>;

    /// Overwrites stored products with the given versions.
    async fn restore_products(
        &self,
        tx: Option<&TransactionHandle>,
        products: Vec<Product>,
    ) -> Result<(), CommerceError>;

    /// Marks products as removed and returns their ids.
    async fn soft_delete_products(
        &self,
        tx: Option<&TransactionHandle>,
        ids: &[String],
    ) -> Result<Vec<String>, CommerceError>;

    /// Brings removed products back.
    async fn restore_deleted(
        &self,
        tx: Option<&TransactionHandle>,
        ids: &[String],
    ) -> Result<(), CommerceError>;
}

/// [`ProductService`] backed by a [`MemoryDatabase`].
pub struct MemoryProductService {
    db: MemoryDatabase,
    fail_on_shipping_profile: AtomicBool,
}

impl MemoryProductService {
    pub fn new(db: MemoryDatabase) -> Self {
        Self {
            db,
            fail_on_shipping_profile: AtomicBool::new(false),
        }
    }

    /// Makes attaching shipping profiles fail.
    pub fn set_fail_on_shipping_profile(&self, fail: bool) {
        self.fail_on_shipping_profile.store(fail, Ordering::SeqCst);
    }
}

fn live_product<'a>(
    products: &'a mut BTreeMap<String, Product>,
    id: &str,
) -> Result<&'a mut Product, CommerceError> {
    products
        .get_mut(id)
        .filter(|product| !product.is_deleted())
        .ok_or_else(|| CommerceError::not_found("Product", id))
}

fn handle_taken(products: &BTreeMap<String, Product>, handle: &str, except: &str) -> bool {
    products
        .values()
        .any(|p| !p.is_deleted() && p.handle == handle && p.id != except)
}

#[async_trait]
impl ProductService for MemoryProductService {
    #[tracing::instrument(skip(self, tx, data), fields(count = data.len()))]
    async fn create_products(
        &self,
        tx: Option<&TransactionHandle>,
        data: Vec<CreateProduct>,
    ) -> Result<Vec<Product>, CommerceError> {
        let now = Utc::now();
        let mut created = Vec::with_capacity(data.len());
        for item in data {
            if item.title.trim().is_empty() {
                return Err(CommerceError::Invalid("product title is required".into()));
            }
            let handle = item.handle.unwrap_or_default();
            if handle.is_empty() {
                return Err(CommerceError::Invalid(format!(
                    "product '{}' has no handle",
                    item.title
                )));
            }
            created.push(Product {
                id: EntityId::generate("prod").to_string(),
                title: item.title,
                handle,
                status: item.status.unwrap_or(ProductStatus::Draft),
                sales_channel_ids: Vec::new(),
                shipping_profile_id: None,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            });
        }

        self.db
            .write(tx, |tables| {
                for product in &created {
                    if handle_taken(&tables.products, &product.handle, &product.id) {
                        return Err(CommerceError::Conflict(format!(
                            "Product with handle: {} already exists",
                            product.handle
                        )));
                    }
                    tables
                        .products
                        .insert(product.id.clone(), product.clone());
                }
                Ok(())
            })
            .await?;

        tracing::info!(count = created.len(), "Products created");
        Ok(created)
    }

    #[tracing::instrument(skip(self, tx))]
    async fn delete_products(
        &self,
        tx: Option<&TransactionHandle>,
        ids: &[String],
    ) -> Result<(), CommerceError> {
        self.db
            .write(tx, |tables| {
                for id in ids {
                    tables.products.remove(id);
                }
                Ok(())
            })
            .await
    }

    #[tracing::instrument(skip(self, tx, links), fields(count = links.len()))]
    async fn attach(
        &self,
        tx: Option<&TransactionHandle>,
        kind: LinkKind,
        links: &[ProductLink],
    ) -> Result<(), CommerceError> {
        if kind == LinkKind::ShippingProfile && self.fail_on_shipping_profile.load(Ordering::SeqCst)
        {
            return Err(CommerceError::Provider(
                "shipping profile service unavailable".into(),
            ));
        }
        self.db
            .write(tx, |tables| {
                for link in links {
                    let product = live_product(&mut tables.products, &link.product_id)?;
                    match kind {
                        LinkKind::SalesChannel => {
                            if !product.sales_channel_ids.contains(&link.target_id) {
                                product.sales_channel_ids.push(link.target_id.clone());
                            }
                        }
                        LinkKind::ShippingProfile => {
                            product.shipping_profile_id = Some(link.target_id.clone());
                        }
                    }
                }
                Ok(())
            })
            .await
    }

    #[tracing::instrument(skip(self, tx, links), fields(count = links.len()))]
    async fn detach(
        &self,
        tx: Option<&TransactionHandle>,
        kind: LinkKind,
        links: &[ProductLink],
    ) -> Result<(), CommerceError> {
        self.db
            .write(tx, |tables| {
                for link in links {
                    let Some(product) = tables.products.get_mut(&link.product_id) else {
                        continue;
                    };
                    match kind {
                        LinkKind::SalesChannel => {
                            product.sales_channel_ids.retain(|id| id != &link.target_id);
                        }
                        LinkKind::ShippingProfile => {
                            if product.shipping_profile_id.as_ref() == Some(&link.target_id) {
                                product.shipping_profile_id = None;
                            }
                        }
                    }
                }
                Ok(())
            })
            .await
    }

    async fn retrieve(
        &self,
        tx: Option<&TransactionHandle>,
        id: &str,
    ) -> Result<Product, CommerceError> {
        self.db
            .read(tx, |tables| {
                tables
                    .products
                    .get(id)
                    .filter(|product| !product.is_deleted())
                    .cloned()
            })
            .await?
            .ok_or_else(|| CommerceError::not_found("Product", id))
    }

    async fn list(
        &self,
        tx: Option<&TransactionHandle>,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, CommerceError> {
        self.db
            .read(tx, |tables| {
                let visible = |product: &&Product| filter.include_deleted || !product.is_deleted();
                match &filter.ids {
                    Some(ids) => ids
                        .iter()
                        .filter_map(|id| tables.products.get(id))
                        .filter(visible)
                        .cloned()
                        .collect(),
                    None => tables.products.values().filter(visible).cloned().collect(),
                }
            })
            .await
    }

    #[tracing::instrument(skip(self, tx, updates), fields(count = updates.len()))]
    async fn update_products(
        &self,
        tx: Option<&TransactionHandle>,
        updates: Vec<UpdateProduct>,
    ) -> Result<Vec<Product>, CommerceError> {
        let now = Utc::now();
        self.db
            .write(tx, |tables| {
                let mut updated = Vec::with_capacity(updates.len());
                for update in updates {
                    if let Some(handle) = &update.handle
                        && handle_taken(&tables.products, handle, &update.id)
                    {
                        return Err(CommerceError::Conflict(format!(
                            "Product with handle: {handle} already exists"
                        )));
                    }
                    let product = live_product(&mut tables.products, &update.id)?;
                    if let Some(title) = update.title {
                        if title.trim().is_empty() {
                            return Err(CommerceError::Invalid(
                                "product title is required".into(),
                            ));
                        }
                        product.title = title;
                    }
                    if let Some(handle) = update.handle {
                        product.handle = handle;
                    }
                    if let Some(status) = update.status {
                        product.status = status;
                    }
                    product.updated_at = now;
                    updated.push(product.clone());
                }
                Ok(updated)
            })
            .await
    }

    #[tracing::instrument(skip(self, tx, products), fields(count = products.len()))]
    async fn restore_products(
        &self,
        tx: Option<&TransactionHandle>,
        products: Vec<Product>,
    ) -> Result<(), CommerceError> {
        self.db
            .write(tx, |tables| {
                for product in products {
                    tables.products.insert(product.id.clone(), product);
                }
                Ok(())
            })
            .await
    }

    #[tracing::instrument(skip(self, tx))]
    async fn soft_delete_products(
        &self,
        tx: Option<&TransactionHandle>,
        ids: &[String],
    ) -> Result<Vec<String>, CommerceError> {
        let now = Utc::now();
        self.db
            .write(tx, |tables| {
                for id in ids {
                    live_product(&mut tables.products, id)?.deleted_at = Some(now);
                }
                Ok(ids.to_vec())
            })
            .await
    }

    #[tracing::instrument(skip(self, tx))]
    async fn restore_deleted(
        &self,
        tx: Option<&TransactionHandle>,
        ids: &[String],
    ) -> Result<(), CommerceError> {
        self.db
            .write(tx, |tables| {
                for id in ids {
                    if let Some(product) = tables.products.get_mut(id) {
                        product.deleted_at = None;
                    }
                }
                Ok(())
            })
            .await
    }
}
