//! Route handlers.

pub mod fulfillments;
pub mod health;
pub mod metrics;
pub mod payments;
pub mod price_lists;
pub mod products;
pub mod workflow_runs;
