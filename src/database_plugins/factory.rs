// ABOUTME: Storage factory selecting the SQLite or in-memory engine from a connection URL
// ABOUTME: Database enum delegates every store trait to the selected implementation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Database factory for creating storage engines
//!
//! `Database::new` inspects the URL and returns the matching engine. The rest
//! of the crate holds a `Database` (or a trait object) and never names an
//! engine directly.

use async_trait::async_trait;
use authz_core::errors::DatabaseError;
use authz_core::models::{OAuthClient, OAuthCode, OAuthRefreshToken, User};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::memory::MemoryDatabase;
use super::sqlite::SqliteDatabase;
use super::{AuthCodeStore, ClientStore, RefreshTokenStore, UserStore};
use crate::config::DatabaseUrl;

/// Storage engine wrapper that delegates to the selected implementation
#[derive(Debug, Clone)]
pub enum Database {
    /// SQLite via sqlx
    SQLite(SqliteDatabase),
    /// Process-local maps
    Memory(MemoryDatabase),
}

impl Database {
    /// Create the engine for `database_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is unsupported or the engine fails to initialize
    pub async fn new(database_url: &str) -> Result<Self, DatabaseError> {
        let parsed =
            DatabaseUrl::parse_url(database_url).map_err(|e| DatabaseError::ConnectionError {
                context: e.message,
            })?;
        Self::from_url(&parsed).await
    }

    /// Create the engine for an already parsed URL
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to initialize
    pub async fn from_url(url: &DatabaseUrl) -> Result<Self, DatabaseError> {
        let db = match url {
            DatabaseUrl::Memory => Self::Memory(MemoryDatabase::new()),
            DatabaseUrl::SQLite { .. } | DatabaseUrl::SQLiteMemory => {
                Self::SQLite(SqliteDatabase::new(&url.to_connection_string()).await?)
            }
        };
        info!("Storage backend: {}", db.backend_info());
        Ok(db)
    }

    /// Fresh in-memory engine
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryDatabase::new())
    }

    /// Get a descriptive string for the current backend
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::SQLite(_) => "SQLite",
            Self::Memory(_) => "In-memory",
        }
    }
}

#[async_trait]
impl ClientStore for Database {
    async fn store_client(&self, client: &OAuthClient) -> Result<(), DatabaseError> {
        match self {
            Self::SQLite(db) => db.store_client(client).await,
            Self::Memory(db) => db.store_client(client).await,
        }
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>, DatabaseError> {
        match self {
            Self::SQLite(db) => db.get_client(client_id).await,
            Self::Memory(db) => db.get_client(client_id).await,
        }
    }
}

#[async_trait]
impl AuthCodeStore for Database {
    async fn store_auth_code(&self, code: &OAuthCode) -> Result<(), DatabaseError> {
        match self {
            Self::SQLite(db) => db.store_auth_code(code).await,
            Self::Memory(db) => db.store_auth_code(code).await,
        }
    }

    async fn get_auth_code(&self, code: &str) -> Result<Option<OAuthCode>, DatabaseError> {
        match self {
            Self::SQLite(db) => db.get_auth_code(code).await,
            Self::Memory(db) => db.get_auth_code(code).await,
        }
    }

    async fn mark_auth_code_used(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        match self {
            Self::SQLite(db) => db.mark_auth_code_used(code, now).await,
            Self::Memory(db) => db.mark_auth_code_used(code, now).await,
        }
    }

    async fn purge_expired_auth_codes(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        match self {
            Self::SQLite(db) => db.purge_expired_auth_codes(now).await,
            Self::Memory(db) => db.purge_expired_auth_codes(now).await,
        }
    }
}

#[async_trait]
impl RefreshTokenStore for Database {
    async fn store_refresh_token(&self, token: &OAuthRefreshToken) -> Result<(), DatabaseError> {
        match self {
            Self::SQLite(db) => db.store_refresh_token(token).await,
            Self::Memory(db) => db.store_refresh_token(token).await,
        }
    }

    async fn get_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<OAuthRefreshToken>, DatabaseError> {
        match self {
            Self::SQLite(db) => db.get_refresh_token(token_hash).await,
            Self::Memory(db) => db.get_refresh_token(token_hash).await,
        }
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        match self {
            Self::SQLite(db) => db.revoke_refresh_token(token_hash, now).await,
            Self::Memory(db) => db.revoke_refresh_token(token_hash, now).await,
        }
    }

    async fn purge_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        match self {
            Self::SQLite(db) => db.purge_expired_refresh_tokens(now).await,
            Self::Memory(db) => db.purge_expired_refresh_tokens(now).await,
        }
    }
}

#[async_trait]
impl UserStore for Database {
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        match self {
            Self::SQLite(db) => db.create_user(user).await,
            Self::Memory(db) => db.create_user(user).await,
        }
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DatabaseError> {
        match self {
            Self::SQLite(db) => db.get_user(user_id).await,
            Self::Memory(db) => db.get_user(user_id).await,
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        match self {
            Self::SQLite(db) => db.get_user_by_email(email).await,
            Self::Memory(db) => db.get_user_by_email(email).await,
        }
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, DatabaseError> {
        match self {
            Self::SQLite(db) => db.set_user_active(user_id, active).await,
            Self::Memory(db) => db.set_user_active(user_id, active).await,
        }
    }
}
