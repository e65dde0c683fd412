use workflow::{DefinitionError, Workflow};

use super::{AccountHolder, CreateAccountHolder, CreatePaymentAccountHolderStep};

pub const CREATE_PAYMENT_ACCOUNT_HOLDER: &str = "create-payment-account-holder-workflow";

/// Creates an account holder and returns it.
pub fn create_payment_account_holder()
-> Result<Workflow<CreateAccountHolder, AccountHolder>, DefinitionError> {
    Workflow::builder(CREATE_PAYMENT_ACCOUNT_HOLDER)
        .step("account_holder", CreatePaymentAccountHolderStep)
        .build()
}
