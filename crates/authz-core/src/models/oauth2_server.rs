// ABOUTME: OAuth 2.1 server persistence models for clients, auth codes, and refresh tokens
// ABOUTME: Grant artifacts expose their lifecycle as an explicit GrantState
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a single-use or rotating grant artifact.
///
/// Artifacts start `Issued` and move to exactly one terminal state. Stores only
/// ever perform the `Issued -> Used` or `Issued -> Revoked` transitions, and
/// only atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    /// Valid and redeemable
    Issued,
    /// Authorization code already exchanged
    Used,
    /// Refresh token rotated out or revoked
    Revoked,
    /// Past its expiry
    Expired,
}

/// Registered OAuth client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Opaque client identifier (UUID)
    pub client_id: String,
    /// Argon2 PHC string of the client secret
    pub client_secret_hash: String,
    /// Human-readable client name
    pub client_name: String,
    /// Registered redirect URIs, compared by exact string match
    pub redirect_uris: Vec<String>,
    /// When this client was registered
    pub created_at: DateTime<Utc>,
}

impl OAuthClient {
    /// Exact, string-for-string redirect URI membership
    #[must_use]
    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

/// Authorization code bound to a PKCE challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCode {
    /// The authorization code value
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Resource owner who approved the request
    pub user_id: Uuid,
    /// Redirect URI that must be repeated at the token endpoint
    pub redirect_uri: String,
    /// PKCE code challenge
    pub code_challenge: String,
    /// PKCE code challenge method, always `S256`
    pub code_challenge_method: String,
    /// Granted scope
    pub scope: String,
    /// When this code expires
    pub expires_at: DateTime<Utc>,
    /// Whether the code has been exchanged
    pub used: bool,
    /// When this code was issued
    pub created_at: DateTime<Utc>,
}

impl OAuthCode {
    /// Current lifecycle state. `Used` takes precedence over `Expired`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> GrantState {
        if self.used {
            GrantState::Used
        } else if self.expires_at <= now {
            GrantState::Expired
        } else {
            GrantState::Issued
        }
    }
}

/// Rotating refresh token. Only the SHA-256 hash of the token is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthRefreshToken {
    /// Hex SHA-256 of the plaintext token
    pub token_hash: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Resource owner
    pub user_id: Uuid,
    /// Granted scope
    pub scope: String,
    /// When this token expires
    pub expires_at: DateTime<Utc>,
    /// Whether this token has been rotated out or revoked
    pub revoked: bool,
    /// When this token was issued
    pub created_at: DateTime<Utc>,
    /// When this token was last presented successfully
    pub last_used_at: Option<DateTime<Utc>>,
}

impl OAuthRefreshToken {
    /// Current lifecycle state. `Revoked` takes precedence over `Expired`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> GrantState {
        if self.revoked {
            GrantState::Revoked
        } else if self.expires_at <= now {
            GrantState::Expired
        } else {
            GrantState::Issued
        }
    }
}
