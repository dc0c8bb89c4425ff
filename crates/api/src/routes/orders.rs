//! Shopper order route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use shopfront_core::{AddressId, OrderId};

use crate::error::AppError;
use crate::middleware::{RequireAuth, require_session};
use crate::models::Order;
use crate::routes::ApiResponse;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::state::AppState;

/// Build the shopper order router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/list", get(list))
        .route("/details/{id}", get(details))
        .route("/cancel/{id}", post(cancel))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub address_id: AddressId,
}

/// Turn the cart into an order.
///
/// # Errors
///
/// Returns 400 for an empty cart, 404 for an unknown address and 409 with
/// the shortfalls when stock does not cover the cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .checkout()
        .place_order(user.id, body.address_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Order placed", order),
    ))
}

/// The user's orders, newest first.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ApiResponse<Vec<Order>>>, AppError> {
    let orders = state.checkout().list_for_user(user.id).await?;
    Ok(ApiResponse::ok(orders))
}

/// One of the user's orders.
///
/// # Errors
///
/// Returns 404 if the order is not the user's.
pub async fn details(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state.checkout().get_for_user(user.id, id).await?;
    Ok(ApiResponse::ok(order))
}

/// Cancel one of the user's orders and return its stock.
///
/// # Errors
///
/// Returns 404 if the order is not the user's and 409 once it has shipped.
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state.checkout().cancel_for_user(user.id, id).await?;
    Ok(ApiResponse::with_message("Order cancelled", order))
}
