//! Database migration command.
//!
//! Applies `crates/api/migrations/` to the database named by
//! `SHOPFRONT_DATABASE_URL` (or `DATABASE_URL`). The server never migrates
//! on startup.

use super::{CliError, connect};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CliError` if the connection or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
