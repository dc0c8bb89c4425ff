//! Shopfront CLI - database migrations and user management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! sf-cli migrate
//!
//! # Create a user (password from SF_CLI_PASSWORD or stdin)
//! sf-cli user create -e admin@example.com -n "Admin Name" -r admin
//!
//! # Promote an existing user to admin
//! sf-cli user promote -e jane@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use shopfront_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`shopper` or `admin`)
        #[arg(short, long, default_value = "shopper")]
        role: Role,
    },
    /// Give an existing user the admin role
    Promote {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create { email, name, role } => {
                commands::user::create(&email, &name, role).await?;
            }
            UserAction::Promote { email } => commands::user::promote(&email).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "sf-cli", "user", "create", "-e", "a@example.com", "-n", "Ann", "-r", "admin",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::User {
                action: UserAction::Create {
                    role: Role::Admin,
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(
            Cli::try_parse_from(["sf-cli", "user", "create", "-e", "a@b.c", "-n", "A", "-r", "root"])
                .is_err()
        );
    }
}
