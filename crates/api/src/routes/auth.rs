//! Authentication route handlers.
//!
//! Login issues a signed session token, set as an `HttpOnly` cookie and also
//! returned in the body for non-browser clients. Logout revokes the token for
//! the rest of its lifetime.

use axum::{
    Extension, Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::auth::{clear_session_cookie, session_cookie};
use crate::middleware::{RequireAuth, auth_rate_limiter, require_session};
use crate::models::{CurrentUser, SessionInfo, User};
use crate::routes::ApiResponse;
use crate::routes::extract::ApiJson;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Build the auth router.
///
/// Register and login are public and rate limited per client IP when
/// `SHOPFRONT_AUTH_RATE_LIMIT` is on; the rest require a session.
pub fn router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login));
    let public = if state.config().auth_rate_limit {
        public.layer(auth_rate_limiter())
    } else {
        public
    };

    let session = Router::new()
        .route("/logout", post(logout))
        .route("/check-auth", get(check_auth))
        .route("/password", put(change_password))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    public.merge(session)
}

/// Registration request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Password change request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Body returned by a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: CurrentUser,
    pub token: String,
    /// Unix timestamp.
    pub expires_at: i64,
}

/// Create a shopper account.
///
/// # Errors
///
/// Returns 400 for invalid fields and 409 if the email is already registered.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .auth()
        .register(&body.email, &body.user_name, &body.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Registration successful", user),
    ))
}

/// Verify credentials and start a session.
///
/// # Errors
///
/// Returns 401 "Invalid credentials" for an unknown email or wrong password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = match state.auth().login(&body.email, &body.password).await {
        Ok(user) => user,
        Err(e @ AuthError::InvalidCredentials) => {
            tracing::warn!(email = %body.email, "Failed login attempt");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let issued = state.tokens().issue(&user)?;
    let max_age = i64::try_from(state.tokens().ttl().as_secs()).unwrap_or(i64::MAX);
    let cookie = session_cookie(
        issued.token.clone(),
        max_age,
        state.config().auth.secure_cookie,
    );
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok((
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        ApiResponse::with_message(
            "Logged in successfully",
            LoginResponse {
                user: current_user(&user),
                token: issued.token,
                expires_at: issued.expires_at,
            },
        ),
    ))
}

/// End the current session.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Extension(session): Extension<SessionInfo>,
) -> impl IntoResponse {
    state.tokens().revoke(&session).await;
    clear_sentry_user();
    tracing::info!("User logged out");

    let cookie = clear_session_cookie(state.config().auth.secure_cookie);
    (
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        ApiResponse::with_message("Logged out successfully", ()),
    )
}

/// Return the identity carried by the session token.
pub async fn check_auth(RequireAuth(user): RequireAuth) -> Json<ApiResponse<CurrentUser>> {
    ApiResponse::with_message("Authenticated user", user)
}

/// Change the current user's password.
///
/// # Errors
///
/// Returns 401 if the current password is wrong and 400 if the new one is
/// too weak.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .auth()
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;

    Ok(ApiResponse::with_message("Password updated", ()))
}

fn current_user(user: &User) -> CurrentUser {
    CurrentUser {
        id: user.id,
        email: user.email.clone(),
        user_name: user.user_name.clone(),
        role: user.role,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::db::memory::MemoryStore;
    use crate::routes::app;
    use crate::services::media::StubImageHost;
    use crate::state::test_support::test_state;

    use super::*;

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_login_sets_cookie() {
        let app = app(test_state(MemoryStore::new(), StubImageHost::new()));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/register",
                &json!({"userName": "Jane", "email": "Jane@Example.com", "password": "correct-horse"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(post_json(
                "/api/auth/login",
                &json!({"email": "jane@example.com", "password": "correct-horse"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["role"], "shopper");
        assert!(body["data"]["token"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_400() {
        let app = app(test_state(MemoryStore::new(), StubImageHost::new()));

        let response = app
            .oneshot(
                Request::post("/api/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_check_auth_requires_session() {
        let app = app(test_state(MemoryStore::new(), StubImageHost::new()));

        let response = app
            .oneshot(
                Request::get("/api/auth/check-auth")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
