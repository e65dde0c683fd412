use workflow::{DefinitionError, Workflow, WorkflowData};

use super::{
    CreateShipment, Fulfillment, UpdateFulfillment, UpdateFulfillmentStep, validate_shipment_step,
};

pub const UPDATE_FULFILLMENT: &str = "update-fulfillment-workflow";
pub const CREATE_SHIPMENT: &str = "create-shipment-workflow";

/// Updates a fulfillment and returns it.
pub fn update_fulfillment() -> Result<Workflow<UpdateFulfillment, Fulfillment>, DefinitionError> {
    Workflow::builder(UPDATE_FULFILLMENT)
        .step("fulfillment", UpdateFulfillmentStep)
        .build()
}

/// Marks a fulfillment as shipped.
///
/// Validates the fulfillment, then runs [`update_fulfillment`] as a nested
/// workflow with the shipment date and labels.
pub fn create_shipment() -> Result<Workflow<CreateShipment, Fulfillment>, DefinitionError> {
    Workflow::builder(CREATE_SHIPMENT)
        .transform("fulfillment_id", &["input"], |data: &WorkflowData| {
            let shipment: CreateShipment = data.input()?;
            Ok(shipment.id)
        })
        .step("validated", validate_shipment_step())
        .transform("update", &["input"], |data: &WorkflowData| {
            let shipment: CreateShipment = data.input()?;
            Ok(UpdateFulfillment::from(shipment))
        })
        .step("fulfillment", update_fulfillment()?.into_step())
        .build()
}
