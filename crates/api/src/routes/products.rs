//! Product endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use commerce::CommerceError;
use commerce::keys;
use commerce::product::{
    CreateProduct, LinkKind, Product, ProductFilter, ProductService, ProductStatus, UpdateProduct,
    prepare_products, product_links,
};
use serde::{Deserialize, Serialize};
use workflow::{ServiceResolverExt, within_transaction};

use crate::error::ApiError;
use crate::flags::WorkflowFlag;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub product: Product,
}

#[derive(Serialize)]
pub struct ListProductsResponse {
    pub products: Vec<Product>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct DeleteProductResponse {
    pub id: String,
    pub object: &'static str,
    pub deleted: bool,
}

fn product_service(state: &AppState) -> Result<Arc<dyn ProductService>, ApiError> {
    Ok(state
        .scope()
        .resolve(keys::PRODUCT)
        .map_err(CommerceError::from)?)
}

/// The single product a one-element workflow or service call returns.
fn single(products: Vec<Product>) -> Result<Product, ApiError> {
    products
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("product operation returned nothing".into()))
}

// -- Handlers --

/// POST /admin/products: create a product with its links.
#[tracing::instrument(skip(state, req), fields(title = %req.title))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProduct>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let products = if state.flags.is_enabled(WorkflowFlag::CreateProducts) {
        state
            .run(&state.workflows.create_products, vec![req])
            .await?
            .output
    } else {
        let service = product_service(&state)?;
        within_transaction(&state.services.database, |tx| async move {
            let prepared = prepare_products(vec![req]);
            let created = service.create_products(Some(&tx), prepared.clone()).await?;
            for kind in [LinkKind::SalesChannel, LinkKind::ShippingProfile] {
                let links = product_links(&prepared, &created, kind);
                if !links.is_empty() {
                    service.attach(Some(&tx), kind, &links).await?;
                }
            }
            let filter = ProductFilter {
                ids: Some(created.into_iter().map(|product| product.id).collect()),
                include_deleted: false,
            };
            service.list(Some(&tx), &filter).await
        })
        .await?
    };

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            product: single(products)?,
        }),
    ))
}

/// GET /admin/products: list products, removed ones on request.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ListProductsResponse>, ApiError> {
    let filter = ProductFilter {
        ids: None,
        include_deleted: query.include_deleted,
    };
    let products = product_service(&state)?.list(None, &filter).await?;
    Ok(Json(ListProductsResponse {
        count: products.len(),
        products,
    }))
}

/// GET /admin/products/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = product_service(&state)?.retrieve(None, &id).await?;
    Ok(Json(ProductResponse { product }))
}

/// POST /admin/products/{id}: update a product.
#[tracing::instrument(skip(state, req))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let update = UpdateProduct {
        id,
        title: req.title,
        handle: req.handle,
        status: req.status,
    };
    let result = state
        .run(&state.workflows.update_products, vec![update])
        .await?;
    Ok(Json(ProductResponse {
        product: single(result.output)?,
    }))
}

/// DELETE /admin/products/{id}: remove a product.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteProductResponse>, ApiError> {
    state
        .run(&state.workflows.remove_products, vec![id.clone()])
        .await?;
    Ok(Json(DeleteProductResponse {
        id,
        object: "product",
        deleted: true,
    }))
}
