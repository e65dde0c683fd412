//! Container keys of the module services.

pub const PRICE_LIST: &str = "price_list";
pub const PAYMENT: &str = "payment";
pub const FULFILLMENT: &str = "fulfillment";
pub const PRODUCT: &str = "product";
