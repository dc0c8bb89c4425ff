//! Access guard middleware and extractors.
//!
//! [`require_session`] resolves the session token into a [`CurrentUser`] and
//! stores it, with the token's [`SessionInfo`], in request extensions.
//! [`require_admin`] must be layered inside it. Handlers then read the
//! identity through [`RequireAuth`].
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/get", get(list))
//!     .route_layer(middleware::from_fn(require_admin))
//!     .route_layer(middleware::from_fn_with_state(state, require_session))
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use cookie::{Cookie, SameSite};

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::auth::SESSION_COOKIE;
use crate::state::AppState;

/// Middleware that rejects requests without a valid, unrevoked session.
///
/// The token is read from the `token` cookie, falling back to an
/// `Authorization: Bearer` header.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` when the token is missing, malformed,
/// expired or revoked.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("missing session token".to_string()))?;

    let (user, session) = state
        .tokens()
        .verify(&token)
        .map_err(|_| AppError::Unauthorized("invalid or expired session".to_string()))?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    request.extensions_mut().insert(user);
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Middleware that rejects non-admin sessions with 403.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if [`require_session`] did not run and
/// `AppError::Forbidden` if the session's role is not admin.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| AppError::Unauthorized("missing session".to_string()))?;

    if !user.role.is_admin() {
        tracing::warn!(
            user_id = %user.id,
            path = %request.uri().path(),
            "Non-admin session denied"
        );
        return Err(AppError::Forbidden("admin access required".to_string()));
    }

    Ok(next.run(request).await)
}

/// Extractor for the identity attached by [`require_session`].
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.user_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("missing session".to_string()))
    }
}

/// Find the session token in the request headers.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    })
}

/// Build the cookie that carries a freshly issued session token.
#[must_use]
pub fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(cookie::time::Duration::seconds(max_age_secs))
        .build()
}

/// Build a cookie that makes the browser drop the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(cookie::time::Duration::ZERO)
        .build()
}
