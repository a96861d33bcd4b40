// ABOUTME: OAuth 2.1 request, response, and error models for registration, authorize, and token
// ABOUTME: Implements RFC 6749, RFC 7591, RFC 8414 and RFC 9728 wire structures
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

// Persistence types live in the core crate
pub use authz_core::models::{GrantState, OAuthClient, OAuthCode, OAuthRefreshToken};

/// OAuth 2.0 Client Registration Request (RFC 7591)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Human-readable client name
    #[serde(default)]
    pub client_name: String,
    /// Redirect URIs for the authorization code flow
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// OAuth 2.0 Client Registration Response (RFC 7591)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    /// Unique client identifier
    pub client_id: String,
    /// Client secret, shown exactly once
    pub client_secret: String,
    /// Client name
    pub client_name: String,
    /// Redirect URIs registered for this client
    pub redirect_uris: Vec<String>,
    /// Registration time (unix seconds)
    pub client_id_issued_at: i64,
    /// Secret expiry, 0 for never
    pub client_secret_expires_at: i64,
    /// Grant types the client may use
    pub grant_types: Vec<String>,
    /// Response types the client may use
    pub response_types: Vec<String>,
    /// Default token endpoint authentication method
    pub token_endpoint_auth_method: String,
}

/// OAuth 2.0 Authorization Request.
///
/// Every field defaults to empty so that a missing parameter and an empty one
/// are rejected the same way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizeRequest {
    /// Must be `code`
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI, must exactly match a registered one
    pub redirect_uri: String,
    /// Requested scope (coerced to the single supported scope)
    pub scope: String,
    /// Opaque client state, echoed back on redirect
    pub state: String,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: String,
    /// PKCE code challenge method, must be `S256`
    pub code_challenge_method: String,
}

/// What the resource owner chose on the consent form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentAction {
    /// Grant access
    #[default]
    Approve,
    /// Refuse access
    Deny,
}

/// Consent form submission: the original request plus credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentForm {
    /// The authorization request, carried in hidden fields
    #[serde(flatten)]
    pub request: AuthorizeRequest,
    /// Resource owner email
    #[serde(default)]
    pub email: String,
    /// Resource owner password
    #[serde(default)]
    pub password: String,
    /// Approve or deny
    #[serde(default)]
    pub action: ConsentAction,
}

/// OAuth 2.0 Token Request (form-encoded)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    pub grant_type: String,
    /// Authorization code (`authorization_code` grant)
    pub code: String,
    /// Redirect URI used at the authorization endpoint
    pub redirect_uri: String,
    /// PKCE code verifier (`authorization_code` grant)
    pub code_verifier: String,
    /// Refresh token (`refresh_token` grant)
    pub refresh_token: String,
    /// Client ID (`client_secret_post`)
    pub client_id: String,
    /// Client secret (`client_secret_post`)
    pub client_secret: String,
    /// Ignored: the granted scope is fixed
    pub scope: String,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token (JWT)
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Rotating refresh token
    pub refresh_token: String,
    /// Granted scope
    pub scope: String,
}

/// OAuth 2.0 Authorization Server Metadata (RFC 8414)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier
    pub issuer: String,
    /// Authorization endpoint URL
    pub authorization_endpoint: String,
    /// Token endpoint URL
    pub token_endpoint: String,
    /// Dynamic client registration endpoint URL
    pub registration_endpoint: String,
    /// Supported response types
    pub response_types_supported: Vec<String>,
    /// Supported grant types
    pub grant_types_supported: Vec<String>,
    /// Supported PKCE methods
    pub code_challenge_methods_supported: Vec<String>,
    /// Supported client authentication methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Supported scopes
    pub scopes_supported: Vec<String>,
}

/// OAuth 2.0 Protected Resource Metadata (RFC 9728)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Protected resource identifier
    pub resource: String,
    /// Authorization servers that issue tokens for this resource
    pub authorization_servers: Vec<String>,
    /// How bearer tokens may be presented
    pub bearer_methods_supported: Vec<String>,
    /// Supported scopes
    pub scopes_supported: Vec<String>,
}

/// OAuth 2.0 Error Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI for error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

const RFC6749_AUTHZ_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1";
const RFC6749_TOKEN_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2";
const RFC7591_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc7591#section-3.2.2";

impl OAuth2Error {
    fn new(error: &str, description: &str, error_uri: Option<&str>) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: error_uri.map(str::to_owned),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new("invalid_request", description, Some(RFC6749_AUTHZ_ERRORS))
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new(
            "invalid_client",
            "Client authentication failed",
            Some(RFC6749_TOKEN_ERRORS),
        )
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", description, Some(RFC6749_TOKEN_ERRORS))
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            "unsupported_grant_type",
            "Grant type not supported",
            Some(RFC6749_TOKEN_ERRORS),
        )
    }

    /// Create an `access_denied` error
    #[must_use]
    pub fn access_denied() -> Self {
        Self::new(
            "access_denied",
            "The resource owner denied the request",
            Some(RFC6749_AUTHZ_ERRORS),
        )
    }

    /// Create a `server_error` error. The description never carries internal detail.
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(
            "server_error",
            "The authorization server encountered an unexpected condition",
            None,
        )
    }

    /// Create an `invalid_redirect_uri` registration error (RFC 7591)
    #[must_use]
    pub fn invalid_redirect_uri(description: &str) -> Self {
        Self::new("invalid_redirect_uri", description, Some(RFC7591_ERRORS))
    }

    /// Create an `invalid_client_metadata` registration error (RFC 7591)
    #[must_use]
    pub fn invalid_client_metadata(description: &str) -> Self {
        Self::new("invalid_client_metadata", description, Some(RFC7591_ERRORS))
    }

    /// Create a `temporarily_unavailable` error, used when rate limited
    #[must_use]
    pub fn temporarily_unavailable(description: &str) -> Self {
        Self::new("temporarily_unavailable", description, None)
    }

    /// HTTP status for this error
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self.error.as_str() {
            "invalid_client" => StatusCode::UNAUTHORIZED,
            "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
            "temporarily_unavailable" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let mut response = (status, Json(self)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            OAuth2Error::invalid_client().http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            OAuth2Error::invalid_grant("x").http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OAuth2Error::unsupported_grant_type().http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OAuth2Error::server_error().http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_is_not_cacheable() {
        let response = OAuth2Error::invalid_grant("expired").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    }

    #[test]
    fn test_consent_form_flattens_request() {
        let form: ConsentForm = serde_urlencoded::from_str(
            "client_id=c&redirect_uri=https%3A%2F%2Fa.example%2Fcb&state=s&email=a%40b.c&password=pw&action=deny",
        )
        .unwrap();
        assert_eq!(form.request.client_id, "c");
        assert_eq!(form.request.redirect_uri, "https://a.example/cb");
        assert_eq!(form.request.response_type, "");
        assert_eq!(form.email, "a@b.c");
        assert_eq!(form.action, ConsentAction::Deny);
    }
}
