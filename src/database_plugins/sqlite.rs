// ABOUTME: SQLite storage engine for OAuth grant artifacts and users using sqlx
// ABOUTME: Runs schema migration on connect and uses conditional UPDATEs for grant transitions
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use authz_core::errors::DatabaseError;
use authz_core::models::{OAuthClient, OAuthCode, OAuthRefreshToken, User, UserRole};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{AuthCodeStore, ClientStore, RefreshTokenStore, UserStore};

/// SQLite engine
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connect to `database_url` (`sqlite:<path>` or `sqlite::memory:`) and migrate
    ///
    /// In-memory databases use a single connection so every query sees the
    /// same database.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or migration fails
    pub async fn new(database_url: &str) -> Result<Self, DatabaseError> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionError {
                context: format!("invalid SQLite URL: {e}"),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionError {
                context: e.to_string(),
            })?;

        let db = Self { pool };
        db.migrate().await?;
        info!(in_memory, "SQLite database ready");
        Ok(db)
    }

    /// Create tables and indices if they do not exist
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        self.migrate_users().await?;
        self.migrate_oauth2().await?;
        debug!("SQLite schema migration complete");
        Ok(())
    }

    async fn migrate_users(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(migration_error("users"))?;
        Ok(())
    }

    async fn migrate_oauth2(&self) -> Result<(), DatabaseError> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS oauth2_clients (
                client_id TEXT PRIMARY KEY,
                client_secret_hash TEXT NOT NULL,
                client_name TEXT NOT NULL,
                redirect_uris TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS oauth2_auth_codes (
                code TEXT PRIMARY KEY,
                client_id TEXT NOT NULL REFERENCES oauth2_clients(client_id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                code_challenge TEXT NOT NULL,
                code_challenge_method TEXT NOT NULL,
                scope TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                used INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS oauth2_refresh_tokens (
                token_hash TEXT PRIMARY KEY,
                client_id TEXT NOT NULL REFERENCES oauth2_clients(client_id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                scope TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                revoked INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                last_used_at INTEGER
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_auth_codes_expires_at ON oauth2_auth_codes(expires_at)",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_refresh_tokens_expires_at ON oauth2_refresh_tokens(expires_at)",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_refresh_tokens_user ON oauth2_refresh_tokens(user_id, client_id)",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(migration_error("oauth2"))?;
        }
        Ok(())
    }
}

fn migration_error(step: &'static str) -> impl Fn(sqlx::Error) -> DatabaseError {
    move |e| DatabaseError::MigrationError {
        context: format!("{step}: {e}"),
    }
}

fn timestamp_to_datetime(
    entity_type: &'static str,
    seconds: i64,
) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| DatabaseError::InvalidRecord {
        entity_type,
        reason: format!("timestamp out of range: {seconds}"),
    })
}

fn parse_uuid(entity_type: &'static str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::InvalidRecord {
        entity_type,
        reason: format!("invalid uuid: {e}"),
    })
}

fn row_to_client(row: &SqliteRow) -> Result<OAuthClient, DatabaseError> {
    let redirect_uris_json: String = row.try_get("redirect_uris")?;
    let redirect_uris: Vec<String> =
        serde_json::from_str(&redirect_uris_json).map_err(|e| DatabaseError::InvalidRecord {
            entity_type: "oauth2_client",
            reason: format!("redirect_uris is not a JSON array: {e}"),
        })?;
    Ok(OAuthClient {
        client_id: row.try_get("client_id")?,
        client_secret_hash: row.try_get("client_secret_hash")?,
        client_name: row.try_get("client_name")?,
        redirect_uris,
        created_at: timestamp_to_datetime("oauth2_client", row.try_get("created_at")?)?,
    })
}

fn row_to_auth_code(row: &SqliteRow) -> Result<OAuthCode, DatabaseError> {
    let user_id: String = row.try_get("user_id")?;
    Ok(OAuthCode {
        code: row.try_get("code")?,
        client_id: row.try_get("client_id")?,
        user_id: parse_uuid("oauth2_auth_code", &user_id)?,
        redirect_uri: row.try_get("redirect_uri")?,
        code_challenge: row.try_get("code_challenge")?,
        code_challenge_method: row.try_get("code_challenge_method")?,
        scope: row.try_get("scope")?,
        expires_at: timestamp_to_datetime("oauth2_auth_code", row.try_get("expires_at")?)?,
        used: row.try_get("used")?,
        created_at: timestamp_to_datetime("oauth2_auth_code", row.try_get("created_at")?)?,
    })
}

fn row_to_refresh_token(row: &SqliteRow) -> Result<OAuthRefreshToken, DatabaseError> {
    let user_id: String = row.try_get("user_id")?;
    let last_used_at: Option<i64> = row.try_get("last_used_at")?;
    Ok(OAuthRefreshToken {
        token_hash: row.try_get("token_hash")?,
        client_id: row.try_get("client_id")?,
        user_id: parse_uuid("oauth2_refresh_token", &user_id)?,
        scope: row.try_get("scope")?,
        expires_at: timestamp_to_datetime("oauth2_refresh_token", row.try_get("expires_at")?)?,
        revoked: row.try_get("revoked")?,
        created_at: timestamp_to_datetime("oauth2_refresh_token", row.try_get("created_at")?)?,
        last_used_at: last_used_at
            .map(|secs| timestamp_to_datetime("oauth2_refresh_token", secs))
            .transpose()?,
    })
}

fn row_to_user(row: &SqliteRow) -> Result<User, DatabaseError> {
    let id: String = row.try_get("id")?;
    let role: String = row.try_get("role")?;
    Ok(User {
        id: parse_uuid("user", &id)?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        role: UserRole::from_str(&role).map_err(|reason| DatabaseError::InvalidRecord {
            entity_type: "user",
            reason,
        })?,
        password_hash: row.try_get("password_hash")?,
        is_active: row.try_get("is_active")?,
        created_at: timestamp_to_datetime("user", row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl ClientStore for SqliteDatabase {
    async fn store_client(&self, client: &OAuthClient) -> Result<(), DatabaseError> {
        let redirect_uris =
            serde_json::to_string(&client.redirect_uris).map_err(|e| DatabaseError::QueryError {
                context: format!("failed to encode redirect_uris: {e}"),
            })?;
        sqlx::query(
            r"
            INSERT INTO oauth2_clients (client_id, client_secret_hash, client_name, redirect_uris, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.client_name)
        .bind(redirect_uris)
        .bind(client.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>, DatabaseError> {
        let row = sqlx::query(
            r"
            SELECT client_id, client_secret_hash, client_name, redirect_uris, created_at
            FROM oauth2_clients WHERE client_id = $1
            ",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_client).transpose()
    }
}

#[async_trait]
impl AuthCodeStore for SqliteDatabase {
    async fn store_auth_code(&self, code: &OAuthCode) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO oauth2_auth_codes
                (code, client_id, user_id, redirect_uri, code_challenge, code_challenge_method,
                 scope, expires_at, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id.to_string())
        .bind(&code.redirect_uri)
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(&code.scope)
        .bind(code.expires_at.timestamp())
        .bind(code.used)
        .bind(code.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_auth_code(&self, code: &str) -> Result<Option<OAuthCode>, DatabaseError> {
        let row = sqlx::query(
            r"
            SELECT code, client_id, user_id, redirect_uri, code_challenge, code_challenge_method,
                   scope, expires_at, used, created_at
            FROM oauth2_auth_codes WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_auth_code).transpose()
    }

    async fn mark_auth_code_used(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r"
            UPDATE oauth2_auth_codes SET used = 1
            WHERE code = $1 AND used = 0 AND expires_at > $2
            ",
        )
        .bind(code)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired_auth_codes(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM oauth2_auth_codes WHERE expires_at <= $1")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RefreshTokenStore for SqliteDatabase {
    async fn store_refresh_token(&self, token: &OAuthRefreshToken) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO oauth2_refresh_tokens
                (token_hash, client_id, user_id, scope, expires_at, revoked, created_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&token.token_hash)
        .bind(&token.client_id)
        .bind(token.user_id.to_string())
        .bind(&token.scope)
        .bind(token.expires_at.timestamp())
        .bind(token.revoked)
        .bind(token.created_at.timestamp())
        .bind(token.last_used_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<OAuthRefreshToken>, DatabaseError> {
        let row = sqlx::query(
            r"
            SELECT token_hash, client_id, user_id, scope, expires_at, revoked, created_at, last_used_at
            FROM oauth2_refresh_tokens WHERE token_hash = $1
            ",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_refresh_token).transpose()
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r"
            UPDATE oauth2_refresh_tokens SET revoked = 1, last_used_at = $2
            WHERE token_hash = $1 AND revoked = 0 AND expires_at > $2
            ",
        )
        .bind(token_hash)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM oauth2_refresh_tokens WHERE expires_at <= $1")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserStore for SqliteDatabase {
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, password_hash, role, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.created_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::Conflict { .. } => DatabaseError::Conflict {
                entity_type: "user",
                reason: "email already registered".to_owned(),
            },
            other => other,
        })?;
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query(
            r"
            SELECT id, email, display_name, password_hash, role, is_active, created_at
            FROM users WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query(
            r"
            SELECT id, email, display_name, password_hash, role, is_active, created_at
            FROM users WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(user_id.to_string())
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
