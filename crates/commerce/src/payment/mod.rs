//! Payment provider account holders.

mod service;
mod steps;
mod workflows;

pub use service::{MemoryPaymentService, PaymentService};
pub use steps::{CREATE_PAYMENT_ACCOUNT_HOLDER_STEP, CreatePaymentAccountHolderStep};
pub use workflows::{CREATE_PAYMENT_ACCOUNT_HOLDER, create_payment_account_holder};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A customer's account at a payment provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountHolder {
    pub id: String,
    pub provider_id: String,
    pub customer_id: String,
    pub external_id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Data needed to create an [`AccountHolder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAccountHolder {
    pub provider_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub data: Value,
}
