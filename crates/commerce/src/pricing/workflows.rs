use workflow::{DefinitionError, Workflow, WorkflowData};

use super::{
    ListPriceListProductPricesStep, MoneyAmount, RemovePriceListProductPrices, RemovePricesStep,
};

pub const REMOVE_PRICE_LIST_PRODUCT_PRICES: &str = "remove-price-list-product-prices";

/// Deletes every price of some products in a price list and returns the
/// deleted money amount ids.
pub fn remove_price_list_product_prices()
-> Result<Workflow<RemovePriceListProductPrices, Vec<String>>, DefinitionError> {
    Workflow::builder(REMOVE_PRICE_LIST_PRODUCT_PRICES)
        .step("prices", ListPriceListProductPricesStep)
        .transform("price_ids", &["prices"], |data: &WorkflowData| {
            let prices: Vec<MoneyAmount> = data.get("prices")?;
            Ok(prices.into_iter().map(|price| price.id).collect::<Vec<_>>())
        })
        .step("removed", RemovePricesStep)
        .build()
}
