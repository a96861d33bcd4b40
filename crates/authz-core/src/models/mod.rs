// ABOUTME: Persistence models for OAuth grant artifacts and resource owners
// ABOUTME: Re-exports client, authorization code, refresh token, and user types
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// OAuth 2.1 server persistence models
pub mod oauth2_server;

/// Resource owner accounts
pub mod user;

pub use oauth2_server::{GrantState, OAuthClient, OAuthCode, OAuthRefreshToken};
pub use user::{User, UserRole};
