//! Price lists and the money amounts they hold.

mod service;
mod steps;
mod workflows;

pub use service::{MemoryPriceListService, PriceListService};
pub use steps::{ListPriceListProductPricesStep, RemovePricesStep};
pub use workflows::{REMOVE_PRICE_LIST_PRODUCT_PRICES, remove_price_list_product_prices};

use common::EntityId;
use serde::{Deserialize, Serialize};

/// A named set of prices overriding the default ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

impl PriceList {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: EntityId::generate("pl").to_string(),
            title: title.into(),
            description: None,
        }
    }
}

/// The price of a product in one currency, inside a price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyAmount {
    pub id: String,
    pub price_list_id: String,
    pub product_id: String,
    pub currency_code: String,
    /// Amount in the currency's smallest unit.
    pub amount: i64,
}

impl MoneyAmount {
    pub fn new(
        price_list_id: impl Into<String>,
        product_id: impl Into<String>,
        currency_code: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            id: EntityId::generate("ma").to_string(),
            price_list_id: price_list_id.into(),
            product_id: product_id.into(),
            currency_code: currency_code.into(),
            amount,
        }
    }
}

/// Input of [`remove_price_list_product_prices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePriceListProductPrices {
    pub price_list_id: String,
    pub product_ids: Vec<String>,
}
