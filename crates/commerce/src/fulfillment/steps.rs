use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use workflow::step::from_fn;
use workflow::{ExecutionContext, FnStep, ServiceRequirement, Step, StepError, StepResponse};

use super::{Fulfillment, FulfillmentService, UpdateFulfillment};
use crate::keys;

fn fulfillments(ctx: &ExecutionContext) -> Result<Arc<dyn FulfillmentService>, StepError> {
    Ok(ctx.resolve(keys::FULFILLMENT)?)
}

/// Fails unless a shipment can be created for the fulfillment with the given
/// id. Nothing to compensate.
pub fn validate_shipment_step() -> FnStep<String, Fulfillment, ()> {
    from_fn("validate-shipment", |id: String, ctx| {
        async move {
            let fulfillment = fulfillments(ctx)?.retrieve(ctx.transaction(), &id).await?;
            fulfillment.validate_shipment()?;
            Ok(StepResponse::without_compensation(fulfillment))
        }
        .boxed()
    })
    .requiring::<Arc<dyn FulfillmentService>>(keys::FULFILLMENT)
}

/// Updates a fulfillment. Compensation restores the previous version.
pub struct UpdateFulfillmentStep;

#[async_trait]
impl Step for UpdateFulfillmentStep {
    type Input = UpdateFulfillment;
    type Output = Fulfillment;
    type CompensateInput = Fulfillment;

    fn name(&self) -> &str {
        "update-fulfillment"
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        vec![ServiceRequirement::of::<Arc<dyn FulfillmentService>>(keys::FULFILLMENT)]
    }

    async fn invoke(
        &self,
        update: UpdateFulfillment,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Fulfillment>, StepError> {
        let service = fulfillments(ctx)?;
        let previous = service.retrieve(ctx.transaction(), &update.id).await?;
        let updated = service.update_fulfillment(ctx.transaction(), update).await?;
        Ok(StepResponse::new(updated, previous))
    }

    async fn compensate(
        &self,
        previous: Option<Fulfillment>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let Some(previous) = previous else {
            return Ok(());
        };
        fulfillments(ctx)?
            .restore(ctx.transaction(), previous)
            .await?;
        Ok(())
    }
}
