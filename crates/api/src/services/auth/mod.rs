//! Authentication service.
//!
//! Provides password registration and login, password changes, and the
//! session tokens handed out on login.

mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use password::PasswordHasher;
pub use token::{IssuedToken, SESSION_COOKIE, SessionTokens};

use tracing::instrument;

use shopfront_core::{Email, Role, UserId};

use crate::db::{RepositoryError, UserRepository};
use crate::models::{NewUser, User};

use password::validate_password;

/// Maximum length of a display name.
const MAX_USER_NAME_LENGTH: usize = 100;

/// Authentication service.
///
/// Handles user registration, login and password changes.
pub struct AuthService<'a> {
    users: &'a dyn UserRepository,
    hasher: &'a PasswordHasher,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserRepository, hasher: &'a PasswordHasher) -> Self {
        Self { users, hasher }
    }

    /// Register a new shopper account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::InvalidUserName` if the name is blank or too long.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        user_name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        self.register_with_role(email, user_name, password, Role::Shopper)
            .await
    }

    /// Register an account with an explicit role (used by the CLI).
    ///
    /// # Errors
    ///
    /// Same as [`AuthService::register`].
    pub async fn register_with_role(
        &self,
        email: &str,
        user_name: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let user_name = validate_user_name(user_name)?;
        validate_password(password)?;

        let password_hash = self.hasher.hash(password).await?;

        let user = self
            .users
            .create(NewUser {
                email,
                user_name,
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// An unknown email and a wrong password are indistinguishable to the
    /// caller, in both the error and the time taken.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let Ok(email) = Email::parse(email) else {
            self.hasher.verify(password, None).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let found = self.users.get_with_password_hash(&email).await?;
        let (user, hash) = match found {
            Some((user, hash)) => (Some(user), Some(hash)),
            None => (None, None),
        };

        self.hasher.verify(password, hash).await?;
        let user = user.ok_or(AuthError::InvalidCredentials)?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// Change a user's password after re-checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if `new` doesn't meet requirements.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let user = self.get_user(user_id).await?;
        let (_, hash) = self
            .users
            .get_with_password_hash(&user.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.hasher.verify(current, Some(hash)).await?;
        validate_password(new)?;

        let new_hash = self.hasher.hash(new).await?;
        self.users
            .update_password_hash(user_id, &new_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

fn validate_user_name(user_name: &str) -> Result<String, AuthError> {
    let user_name = user_name.trim();
    if user_name.is_empty() {
        return Err(AuthError::InvalidUserName("name is required".to_string()));
    }
    if user_name.chars().count() > MAX_USER_NAME_LENGTH {
        return Err(AuthError::InvalidUserName(format!(
            "name must be at most {MAX_USER_NAME_LENGTH} characters"
        )));
    }
    Ok(user_name.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::fast_insecure();
        let auth = AuthService::new(&store, &hasher);

        let user = auth
            .register(" Jane@Example.com ", "Jane", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "jane@example.com");
        assert_eq!(user.role, Role::Shopper);

        let logged_in = auth.login("jane@example.com", "hunter2hunter2").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::fast_insecure();
        let auth = AuthService::new(&store, &hasher);

        auth.register("a@example.com", "A", "password-one").await.unwrap();
        let err = auth
            .register("A@example.com", "B", "password-two")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::fast_insecure();
        let auth = AuthService::new(&store, &hasher);
        auth.register("a@example.com", "A", "password-one").await.unwrap();

        let wrong_password = auth.login("a@example.com", "password-two").await.unwrap_err();
        let unknown_email = auth.login("b@example.com", "password-one").await.unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::fast_insecure();
        let auth = AuthService::new(&store, &hasher);
        let user = auth.register("a@example.com", "A", "password-one").await.unwrap();

        assert!(matches!(
            auth.change_password(user.id, "not-it-at-all", "password-two").await,
            Err(AuthError::InvalidCredentials)
        ));

        auth.change_password(user.id, "password-one", "password-two")
            .await
            .unwrap();
        assert!(auth.login("a@example.com", "password-one").await.is_err());
        assert!(auth.login("a@example.com", "password-two").await.is_ok());
    }

    #[test]
    fn test_validate_user_name() {
        assert_eq!(validate_user_name("  Jane ").unwrap(), "Jane");
        assert!(validate_user_name("   ").is_err());
    }
}
