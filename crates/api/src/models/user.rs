//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfront_core::{Email, Role, UserId};

/// A registered account (domain type).
///
/// The password hash is deliberately not a field: it only ever travels
/// alongside a `User` when a repository is asked for it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email, unique and lower-cased.
    pub email: Email,
    /// Display name chosen at registration.
    pub user_name: String,
    /// Access role.
    pub role: Role,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub user_name: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub role: Role,
}
