//! CLI command implementations.

pub mod migrate;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use shopfront_api::db::RepositoryError;
use shopfront_api::services::auth::AuthError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Account creation failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Repository operation failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Invalid input.
    #[error("{0}")]
    Invalid(String),

    /// Failed to read the password.
    #[error("Failed to read password: {0}")]
    Io(#[from] std::io::Error),
}

/// Connect using `SHOPFRONT_DATABASE_URL`, falling back to `DATABASE_URL`.
pub(crate) async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("SHOPFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CliError::MissingEnvVar("SHOPFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(shopfront_api::db::create_pool(&SecretString::from(database_url)).await?)
}
