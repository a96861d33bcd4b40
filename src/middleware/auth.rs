// ABOUTME: Bearer token authentication middleware for routes protected by this authorization server
// ABOUTME: Validates HS256 access tokens, re-resolves the user, and exposes the identity to handlers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use authz_core::constants::service::SERVICE_NAME;
use authz_core::models::UserRole;
use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth::AuthManager;
use crate::database_plugins::UserStore;
use crate::oauth2_server::OAuth2Error;

const INVALID_TOKEN_DESCRIPTION: &str = "The access token is missing, invalid, or expired";

/// Identity resolved from a valid bearer token, inserted into request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    /// Subject
    pub user_id: Uuid,
    /// Current email from the user store
    pub email: String,
    /// Current display name from the user store
    pub display_name: String,
    /// Current role from the user store
    pub role: UserRole,
    /// Client the token was issued to
    pub client_id: String,
    /// Granted scope
    pub scope: String,
    /// Token id (`jti`)
    pub token_id: String,
}

/// Where to point clients in a `WWW-Authenticate` challenge
#[derive(Debug, Clone, Default)]
pub struct BearerChallenge {
    /// Protected resource metadata URL, when the server is configured
    pub resource_metadata_url: Option<String>,
}

/// Bearer authentication failures
#[derive(Debug, Clone)]
pub enum BearerAuthError {
    /// No credentials on a route that requires them
    MissingToken(BearerChallenge),
    /// Credentials present but rejected
    InvalidToken(BearerChallenge),
    /// The user store failed
    Storage,
}

impl BearerChallenge {
    fn header_value(&self, error: Option<&str>) -> HeaderValue {
        let mut params = vec![format!(r#"realm="{SERVICE_NAME}""#)];
        if let Some(error) = error {
            params.push(format!(r#"error="{error}""#));
        }
        if let Some(url) = &self.resource_metadata_url {
            params.push(format!(r#"resource_metadata="{url}""#));
        }
        HeaderValue::from_str(&format!("Bearer {}", params.join(", ")))
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer"))
    }
}

impl IntoResponse for BearerAuthError {
    fn into_response(self) -> Response {
        let (challenge, error) = match self {
            Self::Storage => return OAuth2Error::server_error().into_response(),
            Self::MissingToken(challenge) => (challenge, None),
            Self::InvalidToken(challenge) => (challenge, Some("invalid_token")),
        };
        let body = serde_json::json!({
            "error": error.unwrap_or("invalid_token"),
            "error_description": INVALID_TOKEN_DESCRIPTION,
        });
        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, challenge.header_value(error));
        response
    }
}

/// Middleware state for bearer authentication
#[derive(Clone)]
pub struct BearerAuthMiddleware {
    auth_manager: Option<Arc<AuthManager>>,
    users: Arc<dyn UserStore>,
    challenge: BearerChallenge,
}

impl BearerAuthMiddleware {
    /// Create bearer middleware; without an `auth_manager` every presented token is rejected
    #[must_use]
    pub fn new(
        auth_manager: Option<Arc<AuthManager>>,
        users: Arc<dyn UserStore>,
        resource_metadata_url: Option<String>,
    ) -> Self {
        Self {
            auth_manager,
            users,
            challenge: BearerChallenge {
                resource_metadata_url,
            },
        }
    }

    /// Authenticate an `Authorization` header value
    ///
    /// Returns `Ok(None)` when no header was sent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` for any rejected credential and `Storage` when
    /// the user store fails
    #[tracing::instrument(skip_all, fields(user_id = tracing::field::Empty))]
    pub async fn authenticate(
        &self,
        authorization: Option<&HeaderValue>,
    ) -> Result<Option<AuthenticatedUser>, BearerAuthError> {
        let Some(value) = authorization else {
            return Ok(None);
        };
        let invalid = || BearerAuthError::InvalidToken(self.challenge.clone());

        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                debug!("Authorization header is not a Bearer credential");
                invalid()
            })?;

        let auth_manager = self.auth_manager.as_ref().ok_or_else(|| {
            warn!("Bearer token presented but no authorization server is configured");
            invalid()
        })?;

        let claims = auth_manager.validate_token(token).map_err(|e| {
            debug!(error = %e, "Bearer token rejected");
            invalid()
        })?;
        let user_id = claims.user_id().map_err(|_| invalid())?;
        tracing::Span::current().record("user_id", user_id.to_string());

        let user = self
            .users
            .get_user(user_id)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "User lookup failed during bearer authentication");
                BearerAuthError::Storage
            })?
            .ok_or_else(|| {
                warn!(user_id = %user_id, "Bearer token for a deleted user");
                invalid()
            })?;
        if !user.is_active {
            warn!(user_id = %user_id, "Bearer token for an inactive user");
            return Err(invalid());
        }

        Ok(Some(AuthenticatedUser {
            user_id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            client_id: claims.client_id,
            scope: claims.scope,
            token_id: claims.jti,
        }))
    }
}

/// Axum middleware: resolve an optional bearer token into [`AuthenticatedUser`]
///
/// Requests without an `Authorization` header pass through unauthenticated.
pub async fn bearer_auth(
    State(middleware): State<BearerAuthMiddleware>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request.headers().get(header::AUTHORIZATION).cloned();
    match middleware.authenticate(authorization.as_ref()).await {
        Ok(user) => {
            request.extensions_mut().insert(middleware.challenge.clone());
            if let Some(user) = user {
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// Extractor requiring an authenticated caller
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = BearerAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                BearerAuthError::MissingToken(
                    parts
                        .extensions
                        .get::<BearerChallenge>()
                        .cloned()
                        .unwrap_or_default(),
                )
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_header() {
        let challenge = BearerChallenge {
            resource_metadata_url: Some(
                "https://auth.example.com/.well-known/oauth-protected-resource".into(),
            ),
        };
        let response = BearerAuthError::InvalidToken(challenge).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let header = response.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert!(header.starts_with("Bearer "));
        assert!(header.contains(r#"error="invalid_token""#));
        assert!(header.contains(
            r#"resource_metadata="https://auth.example.com/.well-known/oauth-protected-resource""#
        ));
    }

    #[test]
    fn test_missing_token_challenge_has_no_error() {
        let response = BearerAuthError::MissingToken(BearerChallenge::default()).into_response();
        let header = response.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert!(!header.contains("error="));
    }

    #[test]
    fn test_storage_failure_is_500() {
        assert_eq!(
            BearerAuthError::Storage.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
