//! Products and their sales channel / shipping profile links.

mod service;
mod steps;
mod workflows;

pub use service::{MemoryProductService, ProductService};
pub use steps::{
    AttachProductLinksStep, CreateProductsStep, RemoveProductsStep, UpdateProductsStep,
    list_products_step,
};
pub use workflows::{
    CREATE_PRODUCTS, REMOVE_PRODUCTS, UPDATE_PRODUCTS, create_products, remove_products,
    update_products,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Proposed,
    Published,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub handle: String,
    pub status: ProductStatus,
    pub sales_channel_ids: Vec<String>,
    pub shipping_profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the product was removed; removed products are hidden from
    /// lookups but can be restored.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub sales_channel_ids: Vec<String>,
    #[serde(default)]
    pub shipping_profile_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
}

/// Which kind of entity a [`ProductLink`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    SalesChannel,
    ShippingProfile,
}

/// Link between a product and a sales channel or shipping profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLink {
    pub product_id: String,
    pub target_id: String,
}

/// Selects products in a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Only these ids, in this order.
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// Fills in defaults: trimmed title, handle derived from the title, draft
/// status.
pub fn prepare_products(input: Vec<CreateProduct>) -> Vec<CreateProduct> {
    input
        .into_iter()
        .map(|product| {
            let title = product.title.trim().to_string();
            let handle = product
                .handle
                .filter(|handle| !handle.trim().is_empty())
                .unwrap_or_else(|| to_handle(&title));
            CreateProduct {
                handle: Some(handle),
                status: Some(product.status.unwrap_or_default()),
                title,
                ..product
            }
        })
        .collect()
}

/// Pairs created products with the link targets their creation data asked
/// for. `prepared` and `created` are in the same order.
pub fn product_links(
    prepared: &[CreateProduct],
    created: &[Product],
    kind: LinkKind,
) -> Vec<ProductLink> {
    prepared
        .iter()
        .zip(created)
        .flat_map(|(data, product)| {
            let targets: Vec<String> = match kind {
                LinkKind::SalesChannel => data.sales_channel_ids.clone(),
                LinkKind::ShippingProfile => data.shipping_profile_id.iter().cloned().collect(),
            };
            targets.into_iter().map(|target_id| ProductLink {
                product_id: product.id.clone(),
                target_id,
            })
        })
        .collect()
}

fn to_handle(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str) -> CreateProduct {
        CreateProduct {
            title: title.into(),
            handle: None,
            status: None,
            sales_channel_ids: vec!["sc_web".into(), "sc_pos".into()],
            shipping_profile_id: Some("sp_default".into()),
        }
    }

    #[test]
    fn prepare_derives_handle_and_status() {
        let prepared = prepare_products(vec![request("  Medusa Hoodie (XL) ")]);

        assert_eq!(prepared[0].title, "Medusa Hoodie (XL)");
        assert_eq!(prepared[0].handle.as_deref(), Some("medusa-hoodie-xl"));
        assert_eq!(prepared[0].status, Some(ProductStatus::Draft));
    }

    #[test]
    fn prepare_keeps_explicit_handle() {
        let mut input = request("Hoodie");
        input.handle = Some("custom".into());
        input.status = Some(ProductStatus::Published);

        let prepared = prepare_products(vec![input]);
        assert_eq!(prepared[0].handle.as_deref(), Some("custom"));
        assert_eq!(prepared[0].status, Some(ProductStatus::Published));
    }

    #[test]
    fn links_follow_creation_order() {
        let prepared = prepare_products(vec![request("A")]);
        let now = Utc::now();
        let created = vec![Product {
            id: "prod_1".into(),
            title: "A".into(),
            handle: "a".into(),
            status: ProductStatus::Draft,
            sales_channel_ids: Vec::new(),
            shipping_profile_id: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }];

        let channels = product_links(&prepared, &created, LinkKind::SalesChannel);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].target_id, "sc_pos");

        let profiles = product_links(&prepared, &created, LinkKind::ShippingProfile);
        assert_eq!(
            profiles,
            vec![ProductLink {
                product_id: "prod_1".into(),
                target_id: "sp_default".into(),
            }]
        );
    }
}
