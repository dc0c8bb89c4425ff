//! Session-related types.
//!
//! The Access Guard resolves a session token into these types and stores them
//! in request extensions for downstream handlers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopfront_core::{Email, Role, UserId};

/// Identity resolved from a verified session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// User's display name.
    pub user_name: String,
    /// Role asserted by the token.
    pub role: Role,
}

/// Token metadata needed to revoke the session on logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    /// Unique token ID (`jti` claim).
    pub token_id: Uuid,
    /// Expiry as a Unix timestamp (`exp` claim).
    pub expires_at: i64,
}
