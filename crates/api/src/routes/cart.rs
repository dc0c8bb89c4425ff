//! Cart route handlers. Every route acts on the session user's own cart.

use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use tracing::instrument;

use shopfront_core::ProductId;

use crate::error::AppError;
use crate::middleware::{RequireAuth, require_session};
use crate::models::CartView;
use crate::routes::ApiResponse;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::state::AppState;

/// Build the cart router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/add", post(add))
        .route("/get", get(show))
        .route("/update-cart", put(update))
        .route("/{product_id}", delete(remove))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
}

/// Body for add and update.
///
/// `quantity` is signed so that zero and negative values reach validation
/// and come back as 400 rather than a deserialization error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Add units of a product, merging with an existing line.
///
/// # Errors
///
/// Returns 400 for `quantity <= 0` and 404 for an unknown product.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CartLineRequest>,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    let cart = state
        .cart()
        .add(user.id, body.product_id, body.quantity)
        .await?;
    Ok(ApiResponse::with_message("Added to cart", cart))
}

/// The cart with current catalog prices.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    let cart = state.cart().view(user.id).await?;
    Ok(ApiResponse::ok(cart))
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns 400 for `quantity <= 0` and 404 if the cart has no such line.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CartLineRequest>,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    let cart = state
        .cart()
        .update(user.id, body.product_id, body.quantity)
        .await?;
    Ok(ApiResponse::with_message("Cart updated", cart))
}

/// Remove a line.
///
/// # Errors
///
/// Returns 404 if the cart has no such line.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    let cart = state.cart().remove(user.id, product_id).await?;
    Ok(ApiResponse::with_message("Removed from cart", cart))
}
