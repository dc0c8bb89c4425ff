//! Saved shipping address route handlers.
//!
//! Addresses are scoped to the session user: another user's address ID
//! behaves exactly like one that does not exist.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};

use shopfront_core::AddressId;

use crate::error::AppError;
use crate::middleware::{RequireAuth, require_session};
use crate::models::{Address, AddressInput};
use crate::routes::ApiResponse;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::state::AppState;

/// Build the address router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/add", post(add))
        .route("/get", get(list))
        .route("/update/{id}", put(update))
        .route("/delete/{id}", delete(remove))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
}

/// Save a new address.
///
/// # Errors
///
/// Returns 400 if a required field is blank.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddressInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let address = state.repos().addresses.create(user.id, input).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Address added", address),
    ))
}

/// The user's saved addresses.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ApiResponse<Vec<Address>>>, AppError> {
    let addresses = state.repos().addresses.list(user.id).await?;
    Ok(ApiResponse::ok(addresses))
}

/// Replace an address.
///
/// # Errors
///
/// Returns 400 if a required field is blank and 404 if the address is not
/// the user's.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
    ApiJson(body): ApiJson<AddressInput>,
) -> Result<Json<ApiResponse<Address>>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let address = state
        .repos()
        .addresses
        .update(user.id, id, input)
        .await?
        .ok_or_else(|| AppError::NotFound("address not found".to_string()))?;
    Ok(ApiResponse::with_message("Address updated", address))
}

/// Delete an address.
///
/// # Errors
///
/// Returns 404 if the address is not the user's.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !state.repos().addresses.delete(user.id, id).await? {
        return Err(AppError::NotFound("address not found".to_string()));
    }
    Ok(ApiResponse::with_message("Address deleted", ()))
}
