//! Payment account holder endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use commerce::payment::{AccountHolder, CreateAccountHolder};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AccountHolderResponse {
    pub account_holder: AccountHolder,
}

/// POST /admin/payment/account-holders: create an account holder at a
/// payment provider.
#[tracing::instrument(skip(state, req), fields(provider_id = %req.provider_id))]
pub async fn create_account_holder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountHolder>,
) -> Result<(StatusCode, Json<AccountHolderResponse>), ApiError> {
    let result = state
        .run(&state.workflows.create_payment_account_holder, req)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AccountHolderResponse {
            account_holder: result.output,
        }),
    ))
}
