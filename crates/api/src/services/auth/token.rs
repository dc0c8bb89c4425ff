//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying the user's identity and role. They are
//! stateless apart from a deny-list of revoked token IDs, which only needs to
//! remember an ID for as long as the token could still be valid.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopfront_core::{Email, Role, UserId};

use super::AuthError;
use crate::config::AuthConfig;
use crate::models::{CurrentUser, SessionInfo, User};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

const ISSUER: &str = "shopfront";
const MAX_REVOKED_TOKENS: u64 = 100_000;

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: UserId,
    pub email: Email,
    pub user_name: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID, used for revocation.
    pub jti: Uuid,
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Issues, verifies and revokes session tokens.
#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    revoked: Cache<Uuid, ()>,
}

impl SessionTokens {
    /// Build from auth configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: config.token_ttl,
            revoked: Cache::builder()
                .max_capacity(MAX_REVOKED_TOKENS)
                .time_to_live(config.token_ttl)
                .build(),
        }
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, AuthError> {
        self.issue_at(user, Utc::now().timestamp())
    }

    fn issue_at(&self, user: &User, now: i64) -> Result<IssuedToken, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            user_name: user.user_name.clone(),
            role: user.role,
            iss: ISSUER.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
            jti: Uuid::new_v4(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Verify a token and resolve the session it represents.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed, badly
    /// signed, expired or revoked.
    pub fn verify(&self, token: &str) -> Result<(CurrentUser, SessionInfo), AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                AuthError::InvalidToken
            })?;
        let claims = data.claims;

        if self.revoked.contains_key(&claims.jti) {
            tracing::debug!(jti = %claims.jti, "Rejected revoked session token");
            return Err(AuthError::InvalidToken);
        }

        Ok((
            CurrentUser {
                id: claims.sub,
                email: claims.email,
                user_name: claims.user_name,
                role: claims.role,
            },
            SessionInfo {
                token_id: claims.jti,
                expires_at: claims.exp,
            },
        ))
    }

    /// Reject a token for the rest of its lifetime.
    pub async fn revoke(&self, session: &SessionInfo) {
        self.revoked.insert(session.token_id, ()).await;
    }
}
