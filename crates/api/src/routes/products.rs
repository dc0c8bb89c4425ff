//! Public catalog route handlers.

use axum::{Json, Router, extract::State, routing::get};
use serde::Deserialize;

use shopfront_core::ProductId;

use crate::error::AppError;
use crate::models::{Product, ProductFilter, ProductSort};
use crate::routes::ApiResponse;
use crate::routes::extract::{ApiPath, ApiQuery};
use crate::state::AppState;

/// Build the shop product router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/get", get(list))
        .route("/get/{id}", get(details))
}

/// Listing query: `?category=men,women&brand=nike&sortBy=price-lowtohigh`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub category: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub sort_by: ProductSort,
}

/// List products matching the filters.
///
/// # Errors
///
/// Returns 400 for an unknown `sortBy`.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>, AppError> {
    let filter = ProductFilter::from_query(
        query.category.as_deref(),
        query.brand.as_deref(),
        query.sort_by,
    );
    let products = state.catalog().list(&filter).await?;
    Ok(ApiResponse::ok(products))
}

/// One product.
///
/// # Errors
///
/// Returns 404 if the product does not exist.
pub async fn details(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<Product>>, AppError> {
    let product = state.catalog().get(id).await?;
    Ok(ApiResponse::ok(product))
}

/// Keyword search over title, description, category and brand.
///
/// # Errors
///
/// Returns 400 for a blank or oversized keyword.
pub async fn search(
    State(state): State<AppState>,
    ApiPath(keyword): ApiPath<String>,
) -> Result<Json<ApiResponse<Vec<Product>>>, AppError> {
    let products = state.catalog().search(&keyword).await?;
    Ok(ApiResponse::ok(products))
}
