//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (database ping)
//!
//! # Auth
//! POST   /api/auth/register               - Create a shopper account
//! POST   /api/auth/login                  - Issue a session token (cookie + body)
//! POST   /api/auth/logout                 - Revoke the session          [session]
//! GET    /api/auth/check-auth             - Current identity            [session]
//! PUT    /api/auth/password               - Change password             [session]
//!
//! # Admin                                                               [admin]
//! POST   /api/admin/products/upload-image - Multipart `my_file` to the media host
//! POST   /api/admin/products/add
//! PUT    /api/admin/products/edit/{id}
//! DELETE /api/admin/products/delete/{id}
//! GET    /api/admin/products/get
//! GET    /api/admin/orders/get
//! GET    /api/admin/orders/details/{id}
//! PUT    /api/admin/orders/update/{id}
//!
//! # Shop
//! GET    /api/shop/products/get           - ?category=a,b&brand=c&sortBy=price-lowtohigh
//! GET    /api/shop/products/get/{id}
//! GET    /api/shop/search/{keyword}
//! POST   /api/shop/cart/add                                             [session]
//! GET    /api/shop/cart/get                                             [session]
//! PUT    /api/shop/cart/update-cart                                     [session]
//! DELETE /api/shop/cart/{product_id}                                    [session]
//! POST   /api/shop/address/add                                          [session]
//! GET    /api/shop/address/get                                          [session]
//! PUT    /api/shop/address/update/{id}                                  [session]
//! DELETE /api/shop/address/delete/{id}                                  [session]
//! POST   /api/shop/order/create                                         [session]
//! GET    /api/shop/order/list                                           [session]
//! GET    /api/shop/order/details/{id}                                   [session]
//! POST   /api/shop/order/cancel/{id}                                    [session]
//! ```

pub mod addresses;
pub mod admin_orders;
pub mod admin_products;
pub mod auth;
pub mod cart;
pub mod extract;
pub mod orders;
pub mod products;

use axum::{
    Json, Router,
    extract::State,
    http::{
        HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA},
    },
    middleware,
    routing::get,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap `data` in a success envelope.
    pub const fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    /// Wrap `data` with a human-readable message.
    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

/// Build the `/api` router.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router(state))
        .nest("/admin/products", admin_products::router(state))
        .nest("/admin/orders", admin_orders::router(state))
        .nest("/shop/products", products::router())
        .route("/shop/search/{keyword}", get(products::search))
        .nest("/shop/cart", cart::router(state))
        .nest("/shop/address", addresses::router(state))
        .nest("/shop/order", orders::router(state))
}

/// Build the complete application: routes, health checks and the
/// middleware stack (everything except the Sentry layers).
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes(&state))
        .fallback(not_found)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors_layer(state.config()))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the browser client.
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, CACHE_CONTROL, EXPIRES, PRAGMA])
        .allow_credentials(true);

    match config.client_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = %config.client_origin, "Invalid client origin, CORS disabled");
            cors
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.repos().health.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound("route not found".to_string())
}
