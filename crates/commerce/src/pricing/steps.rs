use std::sync::Arc;

use async_trait::async_trait;
use workflow::{ExecutionContext, ServiceRequirement, Step, StepError, StepResponse};

use super::{MoneyAmount, PriceListService, RemovePriceListProductPrices};
use crate::keys;

fn price_lists(ctx: &ExecutionContext) -> Result<Arc<dyn PriceListService>, StepError> {
    Ok(ctx.resolve(keys::PRICE_LIST)?)
}

/// Looks up the prices a removal will delete. Read-only.
pub struct ListPriceListProductPricesStep;

#[async_trait]
impl Step for ListPriceListProductPricesStep {
    type Input = RemovePriceListProductPrices;
    type Output = Vec<MoneyAmount>;
    type CompensateInput = ();

    fn name(&self) -> &str {
        "list-price-list-product-prices"
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        vec![ServiceRequirement::of::<Arc<dyn PriceListService>>(keys::PRICE_LIST)]
    }

    async fn invoke(
        &self,
        input: RemovePriceListProductPrices,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Vec<MoneyAmount>, ()>, StepError> {
        let prices = price_lists(ctx)?
            .list_product_prices(ctx.transaction(), &input.price_list_id, &input.product_ids)
            .await?;
        Ok(StepResponse::without_compensation(prices))
    }
}

/// Deletes money amounts by id. Compensation puts the deleted rows back.
pub struct RemovePricesStep;

#[async_trait]
impl Step for RemovePricesStep {
    type Input = Vec<String>;
    type Output = Vec<String>;
    type CompensateInput = Vec<MoneyAmount>;

    fn name(&self) -> &str {
        "remove-prices"
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        vec![ServiceRequirement::of::<Arc<dyn PriceListService>>(keys::PRICE_LIST)]
    }

    async fn invoke(
        &self,
        ids: Vec<String>,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Vec<String>, Vec<MoneyAmount>>, StepError> {
        let removed = price_lists(ctx)?
            .delete_prices(ctx.transaction(), &ids)
            .await?;
        let removed_ids = removed.iter().map(|price| price.id.clone()).collect();
        Ok(StepResponse::new(removed_ids, removed))
    }

    async fn compensate(
        &self,
        removed: Option<Vec<MoneyAmount>>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let Some(removed) = removed.filter(|prices| !prices.is_empty()) else {
            return Ok(());
        };
        price_lists(ctx)?
            .upsert_prices(ctx.transaction(), removed)
            .await?;
        Ok(())
    }
}
