// ABOUTME: Administrative CLI for managing resource owner accounts
// ABOUTME: Creates users with bcrypt passwords and activates or deactivates existing accounts
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use anyhow::{bail, Result};
use authz_core::errors::AppError;
use authz_core::models::{User, UserRole};
use clap::{Parser, Subcommand};
use portfolio_authz::config::{DatabaseUrl, ServerConfig};
use portfolio_authz::crypto::hash_password;
use portfolio_authz::database_plugins::factory::Database;
use portfolio_authz::database_plugins::UserStore;
use portfolio_authz::logging::{LogFormat, LoggingConfig};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "authz-setup",
    about = "Portfolio Authz account management",
    long_about = "Manage the resource owner accounts that sign in on the OAuth consent page."
)]
struct SetupArgs {
    #[command(subcommand)]
    command: SetupCommand,

    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Subcommand)]
enum SetupCommand {
    /// Create a user account
    CreateUser {
        /// Login email
        #[arg(long)]
        email: String,

        /// Password (reads `AUTHZ_SETUP_PASSWORD` when omitted)
        #[arg(long, env = "AUTHZ_SETUP_PASSWORD", hide_env_values = true)]
        password: String,

        /// Display name shown in tokens
        #[arg(long, default_value = "")]
        name: String,

        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },
    /// Deactivate an account; its tokens stop working immediately
    DeactivateUser {
        /// Login email
        #[arg(long)]
        email: String,
    },
    /// Reactivate a deactivated account
    ActivateUser {
        /// Login email
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = SetupArgs::parse();

    LoggingConfig {
        level: if args.verbose { "debug" } else { "info" }.to_owned(),
        format: LogFormat::Compact,
        ..LoggingConfig::from_env()
    }
    .init()?;

    let database_url = match args.database_url.as_deref() {
        Some(url) => DatabaseUrl::parse_url(url)?,
        None => ServerConfig::from_env()?.database,
    };
    if matches!(database_url, DatabaseUrl::Memory | DatabaseUrl::SQLiteMemory) {
        bail!("authz-setup needs a persistent DATABASE_URL, got {database_url}");
    }
    let database = Database::from_url(&database_url).await?;

    match args.command {
        SetupCommand::CreateUser {
            email,
            password,
            name,
            admin,
        } => create_user(&database, &email, &password, &name, admin).await,
        SetupCommand::DeactivateUser { email } => set_active(&database, &email, false).await,
        SetupCommand::ActivateUser { email } => set_active(&database, &email, true).await,
    }
}

async fn create_user(
    database: &Database,
    email: &str,
    password: &str,
    name: &str,
    admin: bool,
) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::invalid_input("Password must be at least 8 characters").into());
    }
    let display_name = if name.is_empty() { email } else { name };
    let mut user = User::new(
        email.trim().to_owned(),
        hash_password(password).await?,
        display_name.to_owned(),
    );
    if admin {
        user.role = UserRole::Admin;
    }
    database.create_user(&user).await?;
    info!(user_id = %user.id, email = %user.email, role = %user.role, "Created user");
    println!("{}", user.id);
    Ok(())
}

async fn set_active(database: &Database, email: &str, active: bool) -> Result<()> {
    let Some(user) = database.get_user_by_email(email.trim()).await? else {
        bail!("No user with email {email}");
    };
    database.set_user_active(user.id, active).await?;
    info!(user_id = %user.id, active, "Updated user activation");
    Ok(())
}
