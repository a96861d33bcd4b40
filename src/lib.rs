// ABOUTME: Main library entry point for the portfolio-authz OAuth 2.1 authorization server
// ABOUTME: Provides DCR, PKCE authorization, rotating refresh tokens, and bearer auth for axum services
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # Portfolio Authz
//!
//! An embedded OAuth 2.1 authorization server for MCP clients.
//!
//! ## Features
//!
//! - **Dynamic client registration** (RFC 7591) with Argon2-hashed secrets
//! - **Authorization code flow** with mandatory PKCE S256 and a consent form
//! - **Token endpoint** with single-use codes and rotating refresh tokens
//! - **HS256 access tokens** validated by a bearer middleware
//! - **Discovery documents** (RFC 8414, RFC 9728)
//! - **Storage engines**: SQLite via sqlx and an in-memory `DashMap` engine
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use portfolio_authz::config::ServerConfig;
//! use portfolio_authz::database_plugins::factory::Database;
//! use portfolio_authz::resources::ServerResources;
//! use portfolio_authz::routes::build_router;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let database = Database::from_url(&config.database).await?;
//!     let resources = Arc::new(ServerResources::new(database, config)?);
//!     let _router = build_router(resources);
//!     Ok(())
//! }
//! ```

// ── Public API ──────────────────────────────────────────────────────────

/// Access token signing and validation
pub mod auth;

/// Environment configuration
pub mod config;

/// Token generation and credential hashing
pub mod crypto;

/// Storage traits and engines
pub mod database_plugins;

/// Unified error handling
pub mod errors;

/// Background maintenance tasks
pub mod lifecycle;

/// Structured logging setup
pub mod logging;

/// Bearer authentication and CORS middleware
pub mod middleware;

/// Signed state for external login round trips
pub mod oauth2_client;

/// OAuth 2.1 authorization server
pub mod oauth2_server;

/// Shared server resources
pub mod resources;

/// HTTP routes and router assembly
pub mod routes;

/// Core models shared with the storage layer
pub mod models {
    pub use authz_core::models::*;
}

/// Application constants
pub mod constants {
    pub use authz_core::constants::*;
}
