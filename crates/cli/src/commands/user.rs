//! User management commands.
//!
//! Admins cannot self-register over HTTP; they are created or promoted here.
//!
//! # Environment Variables
//!
//! - `SHOPFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `SF_CLI_PASSWORD` - Password for `user create` (read from stdin if unset)

use std::io::BufRead;

use shopfront_api::db::postgres::PgStore;
use shopfront_api::db::{RepositoryError, UserRepository};
use shopfront_api::services::auth::{AuthService, PasswordHasher};
use shopfront_core::{Email, Role};

use super::{CliError, connect};

const PASSWORD_ENV: &str = "SF_CLI_PASSWORD";

/// Create a user with an explicit role.
///
/// # Errors
///
/// Returns `CliError` if the password cannot be read, validation fails or
/// the email is taken.
pub async fn create(email: &str, name: &str, role: Role) -> Result<(), CliError> {
    let password = read_password()?;
    let store = PgStore::new(connect().await?);
    let hasher = PasswordHasher::default();

    let user = AuthService::new(&store, &hasher)
        .register_with_role(email, name, &password, role)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "User created");
    Ok(())
}

/// Promote an existing user to admin.
///
/// # Errors
///
/// Returns `CliError` if the email is invalid or no such user exists.
pub async fn promote(email: &str) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|e| CliError::Invalid(e.to_string()))?;
    let store = PgStore::new(connect().await?);

    let user = store
        .set_role(&email, Role::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => CliError::Invalid(format!("No user with email {email}")),
            other => CliError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
    Ok(())
}

fn read_password() -> Result<String, CliError> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }

    tracing::info!("Reading password from stdin ({PASSWORD_ENV} not set)");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(CliError::Invalid("password must not be empty".to_string()));
    }
    Ok(password)
}
