// ABOUTME: Storage abstraction traits for OAuth grant artifacts and resource owner accounts
// ABOUTME: Engines implement atomic conditional transitions for single-use and rotating grants
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Storage plugin architecture.
//!
//! The authorization server depends only on these traits. Grant state changes
//! go through `mark_auth_code_used` and `revoke_refresh_token`, each a single
//! atomic conditional transition in the engine, so concurrent replays of the
//! same code or refresh token cannot both succeed.

use async_trait::async_trait;
use authz_core::errors::DatabaseError;
use authz_core::models::{OAuthClient, OAuthCode, OAuthRefreshToken, User};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage engine selection by URL
pub mod factory;

/// Lock-free in-memory engine (dashmap)
pub mod memory;

/// SQLite engine (sqlx)
pub mod sqlite;

/// Registered OAuth clients
#[async_trait]
pub trait ClientStore: Send + Sync {
    // ================================
    // OAuth Clients
    // ================================

    /// Persist a newly registered client
    async fn store_client(&self, client: &OAuthClient) -> Result<(), DatabaseError>;

    /// Look up a client by id
    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>, DatabaseError>;
}

/// Authorization codes
#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    // ================================
    // Authorization Codes
    // ================================

    /// Persist a newly issued code
    async fn store_auth_code(&self, code: &OAuthCode) -> Result<(), DatabaseError>;

    /// Read a code without changing it
    async fn get_auth_code(&self, code: &str) -> Result<Option<OAuthCode>, DatabaseError>;

    /// Atomically flip `used` from false to true if the code is unused and
    /// unexpired at `now`. Returns `true` only for the caller that performed
    /// the transition.
    async fn mark_auth_code_used(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// Delete codes that expired before `now`, returning how many were removed
    async fn purge_expired_auth_codes(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError>;
}

/// Refresh tokens, keyed by the SHA-256 of the plaintext
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    // ================================
    // Refresh Tokens
    // ================================

    /// Persist a newly issued refresh token
    async fn store_refresh_token(&self, token: &OAuthRefreshToken) -> Result<(), DatabaseError>;

    /// Read a token by hash without changing it
    async fn get_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<OAuthRefreshToken>, DatabaseError>;

    /// Atomically revoke a token that is unrevoked and unexpired at `now`,
    /// stamping `last_used_at`. Returns `true` only for the caller that
    /// performed the transition.
    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// Delete tokens that expired before `now`, returning how many were removed
    async fn purge_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;
}

/// Resource owner accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    // ================================
    // Users
    // ================================

    /// Create an account. Fails with `Conflict` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError>;

    /// Look up an account by id
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Look up an account by email (exact match)
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Activate or deactivate an account. Returns `false` if it does not exist.
    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, DatabaseError>;
}

/// Everything the authorization server persists
pub trait OAuth2Store: ClientStore + AuthCodeStore + RefreshTokenStore {}

impl<T: ClientStore + AuthCodeStore + RefreshTokenStore> OAuth2Store for T {}
