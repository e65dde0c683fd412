//! HTTP host for the commerce workflows.
//!
//! Exposes the admin endpoints of the price list, fulfillment, payment and
//! product modules. Operations that have both a workflow and a legacy
//! implementation pick one per request through [`flags::FlagRouter`]. Every
//! workflow run is journaled and can be inspected under `/admin/workflow-runs`.

pub mod config;
pub mod error;
pub mod flags;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use commerce::MemoryServices;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{DefinitionError, ExecutionJournal, InMemoryJournal};

use flags::FlagRouter;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/admin/price-lists", post(routes::price_lists::create))
        .route(
            "/admin/price-lists/{id}/products/{product_id}/prices",
            delete(routes::price_lists::delete_product_prices),
        )
        .route("/admin/fulfillments", post(routes::fulfillments::create))
        .route(
            "/admin/fulfillments/{id}/shipment",
            post(routes::fulfillments::create_shipment),
        )
        .route(
            "/admin/payment/account-holders",
            post(routes::payments::create_account_holder),
        )
        .route(
            "/admin/products",
            get(routes::products::list).post(routes::products::create),
        )
        .route(
            "/admin/products/{id}",
            get(routes::products::get)
                .post(routes::products::update)
                .delete(routes::products::remove),
        )
        .route(
            "/admin/workflows/{workflow_id}/runs",
            get(routes::workflow_runs::list),
        )
        .route(
            "/admin/workflow-runs/{run_id}",
            get(routes::workflow_runs::get),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over fresh in-memory services, journaling runs
/// to `journal`.
pub fn create_state(
    journal: Arc<dyn ExecutionJournal>,
    flags: FlagRouter,
) -> Result<Arc<AppState>, DefinitionError> {
    Ok(Arc::new(AppState::new(MemoryServices::default(), journal, flags)?))
}

/// Creates application state with an in-memory journal.
pub fn create_default_state(flags: FlagRouter) -> Result<Arc<AppState>, DefinitionError> {
    create_state(Arc::new(InMemoryJournal::new()), flags)
}
