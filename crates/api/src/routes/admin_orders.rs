//! Admin order route handlers.

use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use shopfront_core::{OrderId, OrderStatus};

use crate::error::AppError;
use crate::middleware::{RequireAuth, require_admin, require_session};
use crate::models::Order;
use crate::routes::ApiResponse;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::state::AppState;

/// Build the admin order router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/get", get(list))
        .route("/details/{id}", get(details))
        .route("/update/{id}", put(update_status))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
}

/// Status change request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[serde(alias = "orderStatus")]
    pub status: OrderStatus,
}

/// Every order, newest first.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Order>>>, AppError> {
    let orders = state.checkout().list_all().await?;
    Ok(ApiResponse::ok(orders))
}

/// Any order by ID.
///
/// # Errors
///
/// Returns 404 if the order does not exist.
pub async fn details(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state.checkout().get(id).await?;
    Ok(ApiResponse::ok(order))
}

/// Move an order along its lifecycle.
///
/// # Errors
///
/// Returns 404 if the order does not exist and 409 if the transition is not
/// allowed from its current status.
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id, to = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state.checkout().update_status(id, body.status).await?;
    Ok(ApiResponse::with_message("Order status updated", order))
}
