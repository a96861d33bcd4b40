// ABOUTME: In-memory storage engine built on DashMap for tests and single-process deployments
// ABOUTME: Conditional transitions run under the entry's shard write lock
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use async_trait::async_trait;
use authz_core::errors::DatabaseError;
use authz_core::models::{OAuthClient, OAuthCode, OAuthRefreshToken, User};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{AuthCodeStore, ClientStore, RefreshTokenStore, UserStore};

/// In-memory engine. Clones share the same maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    clients: Arc<DashMap<String, OAuthClient>>,
    auth_codes: Arc<DashMap<String, OAuthCode>>,
    refresh_tokens: Arc<DashMap<String, OAuthRefreshToken>>,
    users: Arc<DashMap<Uuid, User>>,
    user_ids_by_email: Arc<DashMap<String, Uuid>>,
}

impl MemoryDatabase {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for MemoryDatabase {
    async fn store_client(&self, client: &OAuthClient) -> Result<(), DatabaseError> {
        match self.clients.entry(client.client_id.clone()) {
            Entry::Occupied(_) => Err(DatabaseError::Conflict {
                entity_type: "oauth2_client",
                reason: "client_id already registered".to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(client.clone());
                Ok(())
            }
        }
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>, DatabaseError> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}

#[async_trait]
impl AuthCodeStore for MemoryDatabase {
    async fn store_auth_code(&self, code: &OAuthCode) -> Result<(), DatabaseError> {
        match self.auth_codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(DatabaseError::Conflict {
                entity_type: "oauth2_auth_code",
                reason: "authorization code collision".to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(code.clone());
                Ok(())
            }
        }
    }

    async fn get_auth_code(&self, code: &str) -> Result<Option<OAuthCode>, DatabaseError> {
        Ok(self.auth_codes.get(code).map(|c| c.value().clone()))
    }

    async fn mark_auth_code_used(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let Some(mut entry) = self.auth_codes.get_mut(code) else {
            return Ok(false);
        };
        if entry.used || entry.expires_at <= now {
            return Ok(false);
        }
        entry.used = true;
        Ok(true)
    }

    async fn purge_expired_auth_codes(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let before = self.auth_codes.len();
        self.auth_codes.retain(|_, code| code.expires_at > now);
        Ok(before.saturating_sub(self.auth_codes.len()) as u64)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryDatabase {
    async fn store_refresh_token(&self, token: &OAuthRefreshToken) -> Result<(), DatabaseError> {
        match self.refresh_tokens.entry(token.token_hash.clone()) {
            Entry::Occupied(_) => Err(DatabaseError::Conflict {
                entity_type: "oauth2_refresh_token",
                reason: "refresh token collision".to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn get_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<OAuthRefreshToken>, DatabaseError> {
        Ok(self.refresh_tokens.get(token_hash).map(|t| t.value().clone()))
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let Some(mut entry) = self.refresh_tokens.get_mut(token_hash) else {
            return Ok(false);
        };
        if entry.revoked || entry.expires_at <= now {
            return Ok(false);
        }
        entry.revoked = true;
        entry.last_used_at = Some(now);
        Ok(true)
    }

    async fn purge_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|_, token| token.expires_at > now);
        Ok(before.saturating_sub(self.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl UserStore for MemoryDatabase {
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        match self.user_ids_by_email.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(DatabaseError::Conflict {
                entity_type: "user",
                reason: "email already registered".to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(())
            }
        }
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let Some(user_id) = self.user_ids_by_email.get(email).map(|id| *id.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, DatabaseError> {
        Ok(self
            .users
            .get_mut(&user_id)
            .map(|mut user| user.is_active = active)
            .is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(expires_at: DateTime<Utc>) -> OAuthCode {
        OAuthCode {
            code: "abc".to_owned(),
            client_id: "client".to_owned(),
            user_id: Uuid::new_v4(),
            redirect_uri: "https://app.example.com/cb".to_owned(),
            code_challenge: "challenge".to_owned(),
            code_challenge_method: "S256".to_owned(),
            scope: "mcp".to_owned(),
            expires_at,
            used: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mark_used_only_once() {
        let db = MemoryDatabase::new();
        let now = Utc::now();
        db.store_auth_code(&code(now + Duration::minutes(10)))
            .await
            .unwrap();

        assert!(db.mark_auth_code_used("abc", now).await.unwrap());
        assert!(!db.mark_auth_code_used("abc", now).await.unwrap());
        assert!(db.get_auth_code("abc").await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_mark_used_refuses_expired_and_unknown() {
        let db = MemoryDatabase::new();
        let now = Utc::now();
        db.store_auth_code(&code(now - Duration::seconds(1)))
            .await
            .unwrap();
        assert!(!db.mark_auth_code_used("abc", now).await.unwrap());
        assert!(!db.mark_auth_code_used("missing", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let db = MemoryDatabase::new();
        let first = User::new("a@example.com".into(), "h".into(), "A".into());
        let second = User::new("a@example.com".into(), "h".into(), "B".into());
        db.create_user(&first).await.unwrap();
        assert!(matches!(
            db.create_user(&second).await,
            Err(DatabaseError::Conflict { .. })
        ));
        let found = db.get_user_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }
}
