//! Commerce modules running on the workflow engine.
//!
//! Each module pairs a service (trait plus in-memory implementation) with
//! the steps and workflows built on it:
//! - `pricing`: price lists and their money amounts
//! - `payment`: payment provider account holders
//! - `fulfillment`: fulfillments and shipments
//! - `product`: products and their sales channel / shipping profile links
//!
//! Services are registered in a [`workflow::Container`] under the keys of
//! [`keys`] and every write goes through the [`MemoryDatabase`] so a run can
//! be made atomic with a transaction.

pub mod error;
pub mod fulfillment;
pub mod keys;
pub mod payment;
pub mod pricing;
pub mod product;
pub mod store;

use std::sync::Arc;

use workflow::Container;

pub use error::CommerceError;
pub use store::{MemoryDatabase, MemoryTransaction, Tables};

use fulfillment::{FulfillmentService, MemoryFulfillmentService};
use payment::{MemoryPaymentService, PaymentService};
use pricing::{MemoryPriceListService, PriceListService};
use product::{MemoryProductService, ProductService};

/// The in-memory services of every module, sharing one database.
#[derive(Clone)]
pub struct MemoryServices {
    pub database: MemoryDatabase,
    pub price_lists: Arc<MemoryPriceListService>,
    pub payments: Arc<MemoryPaymentService>,
    pub fulfillments: Arc<MemoryFulfillmentService>,
    pub products: Arc<MemoryProductService>,
}

impl MemoryServices {
    pub fn new(database: MemoryDatabase) -> Self {
        Self {
            price_lists: Arc::new(MemoryPriceListService::new(database.clone())),
            payments: Arc::new(MemoryPaymentService::new(database.clone())),
            fulfillments: Arc::new(MemoryFulfillmentService::new(database.clone())),
            products: Arc::new(MemoryProductService::new(database.clone())),
            database,
        }
    }

    /// A container resolving every module service by its key.
    pub fn container(&self) -> Container {
        Container::new()
            .with(
                keys::PRICE_LIST,
                self.price_lists.clone() as Arc<dyn PriceListService>,
            )
            .with(keys::PAYMENT, self.payments.clone() as Arc<dyn PaymentService>)
            .with(
                keys::FULFILLMENT,
                self.fulfillments.clone() as Arc<dyn FulfillmentService>,
            )
            .with(keys::PRODUCT, self.products.clone() as Arc<dyn ProductService>)
    }
}

impl Default for MemoryServices {
    fn default() -> Self {
        Self::new(MemoryDatabase::new())
    }
}
