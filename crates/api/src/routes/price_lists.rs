//! Price list endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use commerce::CommerceError;
use commerce::keys;
use commerce::pricing::{MoneyAmount, PriceList, PriceListService, RemovePriceListProductPrices};
use serde::{Deserialize, Serialize};
use workflow::{ServiceResolverExt, within_transaction};

use crate::error::ApiError;
use crate::flags::WorkflowFlag;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePriceListRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prices: Vec<PriceRequest>,
}

#[derive(Deserialize)]
pub struct PriceRequest {
    pub product_id: String,
    pub currency_code: String,
    pub amount: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct PriceListResponse {
    pub price_list: PriceList,
    pub prices: Vec<MoneyAmount>,
}

#[derive(Serialize)]
pub struct DeleteProductPricesResponse {
    pub ids: Vec<String>,
    pub object: &'static str,
    pub deleted: bool,
}

// -- Handlers --

/// POST /admin/price-lists: create a price list with its prices.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePriceListRequest>,
) -> Result<(StatusCode, Json<PriceListResponse>), ApiError> {
    let service: Arc<dyn PriceListService> = state
        .scope()
        .resolve(keys::PRICE_LIST)
        .map_err(CommerceError::from)?;

    let mut price_list = PriceList::new(req.title);
    price_list.description = req.description;
    let prices: Vec<MoneyAmount> = req
        .prices
        .into_iter()
        .map(|p| MoneyAmount::new(&price_list.id, p.product_id, p.currency_code, p.amount))
        .collect();

    let response = within_transaction(&state.services.database, |tx| async move {
        let price_list = service.create_price_list(Some(&tx), price_list).await?;
        service.upsert_prices(Some(&tx), prices.clone()).await?;
        Ok::<_, CommerceError>(PriceListResponse { price_list, prices })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /admin/price-lists/{id}/products/{product_id}/prices: delete all
/// prices of a product in a price list.
#[tracing::instrument(skip(state))]
pub async fn delete_product_prices(
    State(state): State<Arc<AppState>>,
    Path((id, product_id)): Path<(String, String)>,
) -> Result<Json<DeleteProductPricesResponse>, ApiError> {
    let ids = if state.flags.is_enabled(WorkflowFlag::RemovePriceListProducts) {
        let input = RemovePriceListProductPrices {
            price_list_id: id,
            product_ids: vec![product_id],
        };
        state
            .run(&state.workflows.remove_price_list_product_prices, input)
            .await?
            .output
    } else {
        let service: Arc<dyn PriceListService> = state
            .scope()
            .resolve(keys::PRICE_LIST)
            .map_err(CommerceError::from)?;
        within_transaction(&state.services.database, |tx| async move {
            service
                .delete_product_prices(Some(&tx), &id, &[product_id])
                .await
        })
        .await?
    };

    Ok(Json(DeleteProductPricesResponse {
        ids,
        object: "money-amount",
        deleted: true,
    }))
}
