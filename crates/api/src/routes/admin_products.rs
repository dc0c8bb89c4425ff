//! Admin product management and image upload.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tracing::instrument;

use shopfront_core::ProductId;

use crate::error::AppError;
use crate::middleware::{RequireAuth, require_admin, require_session};
use crate::models::{NewProduct, Product, ProductFilter, ProductUpdate};
use crate::routes::ApiResponse;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::media::{ImageUpload, MAX_UPLOAD_BYTES, UploadedImage};
use crate::state::AppState;

/// Multipart field carrying the image.
const UPLOAD_FIELD: &str = "my_file";

/// Room for multipart boundaries and headers around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the admin product router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/add", post(add))
        .route("/edit/{id}", put(edit))
        .route("/delete/{id}", delete(remove))
        .route("/get", get(list))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
}

/// Forward an image to the media host and return its public URL.
///
/// # Errors
///
/// Returns 400 if the `my_file` field is missing, empty, too large or not an
/// image, and 502 if the media host fails.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadedImage>>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let image = state
            .images()
            .upload(ImageUpload {
                bytes: bytes.to_vec(),
                file_name,
                content_type,
            })
            .await?;
        return Ok(ApiResponse::ok(image));
    }

    Err(AppError::BadRequest(format!(
        "multipart field `{UPLOAD_FIELD}` is required"
    )))
}

/// Add a product.
///
/// # Errors
///
/// Returns 400 if the product fails validation.
pub async fn add(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.catalog().create(body).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Product added", product),
    ))
}

/// Partially update a product.
///
/// # Errors
///
/// Returns 400 for invalid fields and 404 if the product does not exist.
pub async fn edit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ProductUpdate>,
) -> Result<Json<ApiResponse<Product>>, AppError> {
    let product = state.catalog().update(id, body).await?;
    Ok(ApiResponse::with_message("Product updated", product))
}

/// Delete a product.
///
/// # Errors
///
/// Returns 404 if the product does not exist.
pub async fn remove(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.catalog().delete(id).await?;
    Ok(ApiResponse::with_message("Product deleted", ()))
}

/// List every product.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Product>>>, AppError> {
    let products = state.catalog().list(&ProductFilter::default()).await?;
    Ok(ApiResponse::ok(products))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use shopfront_core::{Email, Role};

    use crate::db::UserRepository;
    use crate::db::memory::MemoryStore;
    use crate::models::NewUser;
    use crate::routes::app;
    use crate::services::media::StubImageHost;
    use crate::state::test_support::test_state;

    use super::*;

    const BOUNDARY: &str = "XBOUNDARYX";

    async fn admin_token(state: &AppState, store: &MemoryStore) -> String {
        let user = UserRepository::create(
            store,
            NewUser {
                email: Email::parse("admin@example.com").unwrap(),
                user_name: "Admin".to_string(),
                password_hash: "unused".to_string(),
                role: Role::Admin,
            },
        )
        .await
        .unwrap();
        state.tokens().issue(&user).unwrap().token
    }

    fn multipart_request(token: &str, field: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"shoe.png\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/api/admin/products/upload-image")
            .header("authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_image_returns_url() {
        let store = MemoryStore::new();
        let host = StubImageHost::new();
        let state = test_state(store.clone(), host.clone());
        let token = admin_token(&state, &store).await;

        let response = app(state)
            .oneshot(multipart_request(&token, "my_file", "image/png", b"\x89PNG fake"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert!(body["data"]["url"].as_str().unwrap().ends_with("/shoe.png"));
        assert_eq!(host.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_upload_requires_my_file_field() {
        let store = MemoryStore::new();
        let host = StubImageHost::new();
        let state = test_state(store.clone(), host.clone());
        let token = admin_token(&state, &store).await;

        let response = app(state)
            .oneshot(multipart_request(&token, "other", "image/png", b"data"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(host.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image() {
        let store = MemoryStore::new();
        let state = test_state(store.clone(), StubImageHost::new());
        let token = admin_token(&state, &store).await;

        let response = app(state)
            .oneshot(multipart_request(&token, "my_file", "application/pdf", b"%PDF"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failing_media_host_is_bad_gateway() {
        let store = MemoryStore::new();
        let state = test_state(store.clone(), StubImageHost::failing());
        let token = admin_token(&state, &store).await;

        let response = app(state)
            .oneshot(multipart_request(&token, "my_file", "image/png", b"png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_add_and_list_products() {
        let store = MemoryStore::new();
        let state = test_state(store.clone(), StubImageHost::new());
        let token = admin_token(&state, &store).await;
        let app = app(state);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/admin/products/add")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"title":"Runner","description":"","category":"Men","brand":"Nike","price":"49.99","totalStock":4}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["data"]["category"], "men");

        let response = app
            .oneshot(
                Request::get("/api/admin/products/get")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }
}
