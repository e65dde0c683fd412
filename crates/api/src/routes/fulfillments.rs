//! Fulfillment and shipment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use commerce::CommerceError;
use commerce::fulfillment::{
    CreateShipment, Fulfillment, FulfillmentLabel, FulfillmentService, UpdateFulfillment,
};
use commerce::keys;
use serde::{Deserialize, Serialize};
use workflow::{ServiceResolverExt, within_transaction};

use crate::error::ApiError;
use crate::flags::WorkflowFlag;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateFulfillmentRequest {
    pub location_id: String,
}

#[derive(Deserialize)]
pub struct CreateShipmentRequest {
    #[serde(default)]
    pub labels: Vec<FulfillmentLabel>,
}

#[derive(Serialize)]
pub struct FulfillmentResponse {
    pub fulfillment: Fulfillment,
}

fn fulfillment_service(state: &AppState) -> Result<Arc<dyn FulfillmentService>, ApiError> {
    Ok(state
        .scope()
        .resolve(keys::FULFILLMENT)
        .map_err(CommerceError::from)?)
}

/// POST /admin/fulfillments: register a fulfillment at a stock location.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFulfillmentRequest>,
) -> Result<(StatusCode, Json<FulfillmentResponse>), ApiError> {
    if req.location_id.trim().is_empty() {
        return Err(ApiError::BadRequest("location_id is required".into()));
    }
    let fulfillment = fulfillment_service(&state)?
        .create_fulfillment(None, Fulfillment::new(req.location_id))
        .await?;
    Ok((StatusCode::CREATED, Json(FulfillmentResponse { fulfillment })))
}

/// POST /admin/fulfillments/{id}/shipment: mark a fulfillment as shipped.
#[tracing::instrument(skip(state, req))]
pub async fn create_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateShipmentRequest>,
) -> Result<Json<FulfillmentResponse>, ApiError> {
    let shipment = CreateShipment {
        id,
        labels: req.labels,
        shipped_at: Utc::now(),
    };

    let fulfillment = if state.flags.is_enabled(WorkflowFlag::CreateShipment) {
        state
            .run(&state.workflows.create_shipment, shipment)
            .await?
            .output
    } else {
        let service = fulfillment_service(&state)?;
        within_transaction(&state.services.database, |tx| async move {
            service
                .retrieve(Some(&tx), &shipment.id)
                .await?
                .validate_shipment()?;
            service
                .update_fulfillment(Some(&tx), UpdateFulfillment::from(shipment))
                .await
        })
        .await?
    };

    Ok(Json(FulfillmentResponse { fulfillment }))
}
