//! Fulfillments and shipments.

mod service;
mod steps;
mod workflows;

pub use service::{FulfillmentService, MemoryFulfillmentService};
pub use steps::{UpdateFulfillmentStep, validate_shipment_step};
pub use workflows::{CREATE_SHIPMENT, UPDATE_FULFILLMENT, create_shipment, update_fulfillment};

use chrono::{DateTime, Utc};
use common::EntityId;
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;

/// Shipping label attached to a fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentLabel {
    pub tracking_number: String,
    pub tracking_url: String,
    pub label_url: String,
}

/// Items of an order packed at a stock location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: String,
    pub location_id: String,
    pub packed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<FulfillmentLabel>,
}

impl Fulfillment {
    pub fn new(location_id: impl Into<String>) -> Self {
        Self {
            id: EntityId::generate("ful").to_string(),
            location_id: location_id.into(),
            packed_at: None,
            shipped_at: None,
            delivered_at: None,
            canceled_at: None,
            labels: Vec::new(),
        }
    }

    /// Checks that a shipment can be created for this fulfillment.
    pub fn validate_shipment(&self) -> Result<(), CommerceError> {
        if self.canceled_at.is_some() {
            return Err(CommerceError::Invalid(format!(
                "Cannot create shipment for a canceled fulfillment {}",
                self.id
            )));
        }
        if self.shipped_at.is_some() {
            return Err(CommerceError::Invalid(format!(
                "Fulfillment with id: {} has already been shipped",
                self.id
            )));
        }
        Ok(())
    }
}

/// Input of [`create_shipment`].
///
/// `shipped_at` is chosen by the caller so the workflow stays deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShipment {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<FulfillmentLabel>,
    pub shipped_at: DateTime<Utc>,
}

/// Partial update of a fulfillment. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFulfillment {
    pub id: String,
    #[serde(default)]
    pub packed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Option<Vec<FulfillmentLabel>>,
}

impl UpdateFulfillment {
    pub(crate) fn apply_to(&self, fulfillment: &mut Fulfillment) {
        if let Some(packed_at) = self.packed_at {
            fulfillment.packed_at = Some(packed_at);
        }
        if let Some(shipped_at) = self.shipped_at {
            fulfillment.shipped_at = Some(shipped_at);
        }
        if let Some(delivered_at) = self.delivered_at {
            fulfillment.delivered_at = Some(delivered_at);
        }
        if let Some(labels) = &self.labels {
            fulfillment.labels = labels.clone();
        }
    }
}

impl From<CreateShipment> for UpdateFulfillment {
    fn from(shipment: CreateShipment) -> Self {
        Self {
            id: shipment.id,
            shipped_at: Some(shipment.shipped_at),
            labels: Some(shipment.labels),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipment_rules() {
        let mut fulfillment = Fulfillment::new("sloc_1");
        assert!(fulfillment.validate_shipment().is_ok());

        fulfillment.shipped_at = Some(Utc::now());
        assert!(matches!(
            fulfillment.validate_shipment(),
            Err(CommerceError::Invalid(msg)) if msg.contains("already been shipped")
        ));

        fulfillment.shipped_at = None;
        fulfillment.canceled_at = Some(Utc::now());
        assert!(fulfillment.validate_shipment().is_err());
    }

    #[test]
    fn update_leaves_missing_fields_untouched() {
        let packed = Utc::now();
        let mut fulfillment = Fulfillment::new("sloc_1");
        fulfillment.packed_at = Some(packed);

        let shipped = Utc::now();
        UpdateFulfillment {
            id: fulfillment.id.clone(),
            shipped_at: Some(shipped),
            ..Default::default()
        }
        .apply_to(&mut fulfillment);

        assert_eq!(fulfillment.packed_at, Some(packed));
        assert_eq!(fulfillment.shipped_at, Some(shipped));
        assert!(fulfillment.labels.is_empty());
    }
}
