use std::sync::Arc;

use async_trait::async_trait;
use workflow::{ExecutionContext, ServiceRequirement, Step, StepError, StepResponse};

use super::{AccountHolder, CreateAccountHolder, PaymentService};
use crate::keys;

pub const CREATE_PAYMENT_ACCOUNT_HOLDER_STEP: &str = "create-payment-account-holder";

/// Creates the account holder in the payment provider.
///
/// The created holder is both the output and the compensation input;
/// compensation deletes it by id.
pub struct CreatePaymentAccountHolderStep;

#[async_trait]
impl Step for CreatePaymentAccountHolderStep {
    type Input = CreateAccountHolder;
    type Output = AccountHolder;
    type CompensateInput = AccountHolder;

    fn name(&self) -> &str {
        CREATE_PAYMENT_ACCOUNT_HOLDER_STEP
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        vec![ServiceRequirement::of::<Arc<dyn PaymentService>>(keys::PAYMENT)]
    }

    async fn invoke(
        &self,
        data: CreateAccountHolder,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<AccountHolder>, StepError> {
        let service: Arc<dyn PaymentService> = ctx.resolve(keys::PAYMENT)?;
        let holder = service
            .create_account_holder(ctx.transaction(), data)
            .await?;
        Ok(StepResponse::compensate_with_output(holder))
    }

    async fn compensate(
        &self,
        created: Option<AccountHolder>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let Some(created) = created else {
            return Ok(());
        };
        let service: Arc<dyn PaymentService> = ctx.resolve(keys::PAYMENT)?;
        service
            .delete_account_holder(ctx.transaction(), &created.id)
            .await?;
        Ok(())
    }
}
