// ABOUTME: OAuth 2.1 authorization and token endpoint logic independent of the HTTP layer
// ABOUTME: Validates authorize requests, issues PKCE-bound codes, and exchanges codes and refresh tokens
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use authz_core::constants::oauth::{
    GRANT_TYPE_AUTHORIZATION_CODE, GRANT_TYPE_REFRESH_TOKEN, PKCE_METHOD_S256,
    RESPONSE_TYPE_CODE, SUPPORTED_SCOPE, TOKEN_ENTROPY_BYTES, TOKEN_TYPE_BEARER,
};
use authz_core::models::User;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use super::client_registration::ClientRegistrationManager;
use super::models::{
    AuthorizeRequest, ClientRegistrationRequest, ClientRegistrationResponse, ConsentAction,
    ConsentForm, GrantState, OAuth2Error, OAuthClient, OAuthCode, OAuthRefreshToken,
    TokenRequest, TokenResponse,
};
use super::pkce::verify_code_verifier;
use crate::auth::AuthManager;
use crate::config::OAuth2ServerConfig;
use crate::crypto::{generate_url_safe_token, sha256_hex, verify_password};
use crate::database_plugins::{OAuth2Store, UserStore};

/// An authorization request whose client and redirect URI are trusted and
/// whose remaining parameters passed validation
#[derive(Debug, Clone)]
pub struct ValidatedAuthorization {
    /// The registered client
    pub client: OAuthClient,
    /// Exact registered redirect URI
    pub redirect_uri: String,
    /// Client state, echoed on every redirect
    pub state: String,
    /// PKCE S256 challenge
    pub code_challenge: String,
    /// Normalized scope
    pub scope: String,
}

/// Why an authorization request was rejected
#[derive(Debug, Clone)]
pub enum AuthorizeRejection {
    /// `client_id` or `redirect_uri` not trusted: show the error, never redirect
    Direct(OAuth2Error),
    /// Trust established: report the error to the client's redirect URI
    Redirect {
        /// Registered redirect URI
        redirect_uri: String,
        /// Error to report
        error: OAuth2Error,
        /// Client state, omitted when empty
        state: Option<String>,
    },
}

impl AuthorizeRejection {
    fn redirect(redirect_uri: &str, error: OAuth2Error, state: &str) -> Self {
        Self::Redirect {
            redirect_uri: redirect_uri.to_owned(),
            error,
            state: (!state.is_empty()).then(|| state.to_owned()),
        }
    }
}

/// Result of a consent form submission
#[derive(Debug, Clone)]
pub enum ConsentOutcome {
    /// Send the user agent to this location (code issued or access denied)
    Redirect(String),
    /// Credentials were rejected; show the form again
    InvalidCredentials(ValidatedAuthorization),
}

/// OAuth 2.0 Authorization Server
pub struct OAuth2AuthorizationServer {
    client_manager: ClientRegistrationManager,
    store: Arc<dyn OAuth2Store>,
    users: Arc<dyn UserStore>,
    auth_manager: Arc<AuthManager>,
    auth_code_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl OAuth2AuthorizationServer {
    /// Creates an authorization server over the given stores
    #[must_use]
    pub fn new(
        store: Arc<dyn OAuth2Store>,
        users: Arc<dyn UserStore>,
        auth_manager: Arc<AuthManager>,
        config: &OAuth2ServerConfig,
    ) -> Self {
        Self {
            client_manager: ClientRegistrationManager::new(Arc::clone(&store)),
            store,
            users,
            auth_manager,
            auth_code_ttl: Duration::seconds(config.auth_code_ttl_secs),
            refresh_token_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    /// Issuer of the access tokens this server signs
    #[must_use]
    pub fn issuer(&self) -> &str {
        self.auth_manager.issuer()
    }

    /// Register a client (`POST /oauth/register`)
    ///
    /// # Errors
    ///
    /// See [`ClientRegistrationManager::register_client`]
    pub async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        self.client_manager.register_client(request).await
    }

    /// Validate an authorization request
    ///
    /// `client_id` and `redirect_uri` are checked first. Until both match a
    /// registered pair exactly, failures are [`AuthorizeRejection::Direct`].
    ///
    /// # Errors
    ///
    /// Returns the rejection describing how the error must be reported
    pub async fn validate_authorization_request(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<ValidatedAuthorization, AuthorizeRejection> {
        if request.client_id.is_empty() {
            return Err(AuthorizeRejection::Direct(OAuth2Error::invalid_request(
                "Missing required parameter: client_id",
            )));
        }

        let client = self
            .client_manager
            .get_client(&request.client_id)
            .await
            .map_err(|e| {
                error!(error = %e, client_id = %request.client_id, "Client lookup failed");
                AuthorizeRejection::Direct(OAuth2Error::server_error())
            })?
            .ok_or_else(|| {
                warn!(client_id = %request.client_id, "Authorization request for unknown client");
                AuthorizeRejection::Direct(OAuth2Error::invalid_request("Unknown client_id"))
            })?;

        if request.redirect_uri.is_empty() || !client.has_redirect_uri(&request.redirect_uri) {
            warn!(
                client_id = %client.client_id,
                "Authorization request with unregistered redirect_uri"
            );
            return Err(AuthorizeRejection::Direct(OAuth2Error::invalid_request(
                "redirect_uri does not match a registered redirect URI for this client",
            )));
        }

        let reject = |description: &str| {
            AuthorizeRejection::redirect(
                &request.redirect_uri,
                OAuth2Error::invalid_request(description),
                &request.state,
            )
        };

        if request.response_type != RESPONSE_TYPE_CODE {
            return Err(reject("response_type must be 'code'"));
        }
        if request.code_challenge.is_empty() {
            return Err(reject("code_challenge is required (PKCE)"));
        }
        if request.code_challenge_method != PKCE_METHOD_S256 {
            return Err(reject("code_challenge_method must be 'S256'"));
        }
        if request.state.is_empty() {
            return Err(reject("state is required"));
        }

        Ok(ValidatedAuthorization {
            client,
            redirect_uri: request.redirect_uri.clone(),
            state: request.state.clone(),
            code_challenge: request.code_challenge.clone(),
            scope: normalize_scope(&request.scope),
        })
    }

    /// Handle a consent form submission (`POST /oauth/authorize`)
    ///
    /// The hidden request fields are validated again before anything else.
    ///
    /// # Errors
    ///
    /// Returns a rejection for invalid requests and for storage failures
    pub async fn handle_consent(
        &self,
        form: &ConsentForm,
    ) -> Result<ConsentOutcome, AuthorizeRejection> {
        let validated = self.validate_authorization_request(&form.request).await?;

        if form.action == ConsentAction::Deny {
            info!(client_id = %validated.client.client_id, "Resource owner denied authorization");
            let location = build_redirect(
                &validated.redirect_uri,
                &error_params(&OAuth2Error::access_denied(), Some(&validated.state)),
            )
            .map_err(AuthorizeRejection::Direct)?;
            return Ok(ConsentOutcome::Redirect(location));
        }

        let redirect_error = |error: OAuth2Error| {
            AuthorizeRejection::redirect(&validated.redirect_uri, error, &validated.state)
        };

        let Some(user) = self
            .authenticate_resource_owner(&form.email, &form.password)
            .await
            .map_err(redirect_error)?
        else {
            return Ok(ConsentOutcome::InvalidCredentials(validated));
        };

        let code = self
            .issue_authorization_code(&validated, &user, Utc::now())
            .await
            .map_err(redirect_error)?;
        let location = build_redirect(
            &validated.redirect_uri,
            &[("code", code.as_str()), ("state", validated.state.as_str())],
        )
        .map_err(AuthorizeRejection::Direct)?;

        info!(
            client_id = %validated.client.client_id,
            user_id = %user.id,
            "Issued authorization code"
        );
        Ok(ConsentOutcome::Redirect(location))
    }

    /// Authenticate a resource owner by email and password
    ///
    /// Returns `Ok(None)` for every credential failure. Unknown emails still
    /// run a hash verification.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the user store or hashing fails
    pub async fn authenticate_resource_owner(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, OAuth2Error> {
        let user = self
            .users
            .get_user_by_email(email.trim())
            .await
            .map_err(|e| {
                error!(error = %e, "User lookup failed during consent");
                OAuth2Error::server_error()
            })?;

        let verified = verify_password(password, user.as_ref().map(|u| u.password_hash.as_str()))
            .await
            .map_err(|e| {
                error!(error = %e, "Password verification failed to run");
                OAuth2Error::server_error()
            })?;

        match user {
            Some(user) if verified && user.is_active => Ok(Some(user)),
            Some(user) if verified => {
                warn!(user_id = %user.id, "Inactive user attempted to authorize a client");
                Ok(None)
            }
            _ => {
                debug!("Resource owner authentication failed");
                Ok(None)
            }
        }
    }

    /// Persist a fresh authorization code bound to the validated request
    ///
    /// # Errors
    ///
    /// Returns `server_error` if generation or storage fails
    pub async fn issue_authorization_code(
        &self,
        validated: &ValidatedAuthorization,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<String, OAuth2Error> {
        let code = generate_url_safe_token(TOKEN_ENTROPY_BYTES).map_err(|e| {
            error!(error = %e, "Failed to generate authorization code");
            OAuth2Error::server_error()
        })?;

        let record = OAuthCode {
            code: code.clone(),
            client_id: validated.client.client_id.clone(),
            user_id: user.id,
            redirect_uri: validated.redirect_uri.clone(),
            code_challenge: validated.code_challenge.clone(),
            code_challenge_method: PKCE_METHOD_S256.to_owned(),
            scope: validated.scope.clone(),
            expires_at: now + self.auth_code_ttl,
            used: false,
            created_at: now,
        };
        self.store.store_auth_code(&record).await.map_err(|e| {
            error!(error = %e, "Failed to store authorization code");
            OAuth2Error::server_error()
        })?;

        Ok(code)
    }

    /// Handle a token request (`POST /oauth/token`)
    ///
    /// # Errors
    ///
    /// Returns the OAuth2 error to send to the client
    pub async fn token(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        self.token_at(request, Utc::now()).await
    }

    /// Handle a token request against the clock value `now`
    ///
    /// # Errors
    ///
    /// Returns the OAuth2 error to send to the client
    pub async fn token_at(
        &self,
        request: TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, OAuth2Error> {
        match request.grant_type.as_str() {
            GRANT_TYPE_AUTHORIZATION_CODE => self.handle_authorization_code_grant(request, now).await,
            GRANT_TYPE_REFRESH_TOKEN => self.handle_refresh_token_grant(request, now).await,
            other => {
                debug!(grant_type = %other, "Unsupported grant type");
                Err(OAuth2Error::unsupported_grant_type())
            }
        }
    }

    async fn handle_authorization_code_grant(
        &self,
        request: TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, OAuth2Error> {
        require_params(&[
            ("code", &request.code),
            ("client_id", &request.client_id),
            ("client_secret", &request.client_secret),
            ("redirect_uri", &request.redirect_uri),
            ("code_verifier", &request.code_verifier),
        ])?;

        let client = self
            .client_manager
            .authenticate_client(&request.client_id, &request.client_secret)
            .await?;

        let auth_code = self
            .store
            .get_auth_code(&request.code)
            .await
            .map_err(|e| {
                error!(error = %e, "Authorization code lookup failed");
                OAuth2Error::server_error()
            })?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid authorization code"))?;

        match auth_code.state_at(now) {
            GrantState::Used => {
                warn!(client_id = %client.client_id, "Authorization code replay detected");
                return Err(OAuth2Error::invalid_grant(
                    "Authorization code has already been used",
                ));
            }
            GrantState::Expired => {
                return Err(OAuth2Error::invalid_grant("Authorization code has expired"));
            }
            GrantState::Issued | GrantState::Revoked => {}
        }
        if auth_code.client_id != client.client_id {
            warn!(client_id = %client.client_id, "Authorization code presented by the wrong client");
            return Err(OAuth2Error::invalid_grant(
                "Authorization code was not issued to this client",
            ));
        }
        if auth_code.redirect_uri != request.redirect_uri {
            return Err(OAuth2Error::invalid_grant(
                "redirect_uri does not match the authorization request",
            ));
        }
        if !verify_code_verifier(
            &request.code_verifier,
            &auth_code.code_challenge,
            &auth_code.code_challenge_method,
        ) {
            warn!(client_id = %client.client_id, "PKCE verification failed");
            return Err(OAuth2Error::invalid_grant("PKCE verification failed"));
        }

        let marked = self
            .store
            .mark_auth_code_used(&auth_code.code, now)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to mark authorization code as used");
                OAuth2Error::server_error()
            })?;
        if !marked {
            warn!(client_id = %client.client_id, "Lost race redeeming authorization code");
            return Err(OAuth2Error::invalid_grant(
                "Authorization code has already been used",
            ));
        }

        let user = self.load_active_user(auth_code.user_id).await?;
        let response = self
            .issue_token_pair(&user, &client.client_id, &auth_code.scope, now)
            .await?;
        info!(
            client_id = %client.client_id,
            user_id = %user.id,
            "Exchanged authorization code for tokens"
        );
        Ok(response)
    }

    async fn handle_refresh_token_grant(
        &self,
        request: TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, OAuth2Error> {
        require_params(&[
            ("refresh_token", &request.refresh_token),
            ("client_id", &request.client_id),
            ("client_secret", &request.client_secret),
        ])?;

        let client = self
            .client_manager
            .authenticate_client(&request.client_id, &request.client_secret)
            .await?;

        let token_hash = sha256_hex(&request.refresh_token);
        let stored = self
            .store
            .get_refresh_token(&token_hash)
            .await
            .map_err(|e| {
                error!(error = %e, "Refresh token lookup failed");
                OAuth2Error::server_error()
            })?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid refresh token"))?;

        match stored.state_at(now) {
            GrantState::Revoked | GrantState::Used => {
                warn!(client_id = %client.client_id, "Revoked refresh token presented");
                return Err(OAuth2Error::invalid_grant("Refresh token has been revoked"));
            }
            GrantState::Expired => {
                return Err(OAuth2Error::invalid_grant("Refresh token has expired"));
            }
            GrantState::Issued => {}
        }
        if stored.client_id != client.client_id {
            warn!(client_id = %client.client_id, "Refresh token presented by the wrong client");
            return Err(OAuth2Error::invalid_grant(
                "Refresh token was not issued to this client",
            ));
        }

        let revoked = self
            .store
            .revoke_refresh_token(&token_hash, now)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to revoke refresh token during rotation");
                OAuth2Error::server_error()
            })?;
        if !revoked {
            return Err(OAuth2Error::invalid_grant("Refresh token has been revoked"));
        }

        let user = self.load_active_user(stored.user_id).await?;
        let response = self
            .issue_token_pair(&user, &client.client_id, &stored.scope, now)
            .await?;
        info!(
            client_id = %client.client_id,
            user_id = %user.id,
            "Rotated refresh token"
        );
        Ok(response)
    }

    async fn load_active_user(&self, user_id: Uuid) -> Result<User, OAuth2Error> {
        let user = self
            .users
            .get_user(user_id)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "User lookup failed during token exchange");
                OAuth2Error::server_error()
            })?;
        match user {
            Some(user) if user.is_active => Ok(user),
            _ => {
                warn!(user_id = %user_id, "Grant belongs to a missing or inactive user");
                Err(OAuth2Error::invalid_grant("Resource owner is not active"))
            }
        }
    }

    async fn issue_token_pair(
        &self,
        user: &User,
        client_id: &str,
        scope: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let access = self
            .auth_manager
            .generate_access_token_at(user, client_id, scope, now)
            .map_err(|e| {
                error!(error = %e, "Failed to sign access token");
                OAuth2Error::server_error()
            })?;

        let refresh_token = generate_url_safe_token(TOKEN_ENTROPY_BYTES).map_err(|e| {
            error!(error = %e, "Failed to generate refresh token");
            OAuth2Error::server_error()
        })?;
        let record = OAuthRefreshToken {
            token_hash: sha256_hex(&refresh_token),
            client_id: client_id.to_owned(),
            user_id: user.id,
            scope: scope.to_owned(),
            expires_at: now + self.refresh_token_ttl,
            revoked: false,
            created_at: now,
            last_used_at: None,
        };
        self.store.store_refresh_token(&record).await.map_err(|e| {
            error!(error = %e, "Failed to store refresh token");
            OAuth2Error::server_error()
        })?;

        Ok(TokenResponse {
            access_token: access.token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: access.expires_in,
            refresh_token,
            scope: scope.to_owned(),
        })
    }
}

/// Only one scope exists; anything else is coerced to it
fn normalize_scope(requested: &str) -> String {
    if requested != SUPPORTED_SCOPE {
        debug!(requested = %requested, "Coercing requested scope to {SUPPORTED_SCOPE}");
    }
    SUPPORTED_SCOPE.to_owned()
}

fn require_params(params: &[(&str, &String)]) -> Result<(), OAuth2Error> {
    match params.iter().find(|(_, value)| value.is_empty()) {
        Some((name, _)) => Err(OAuth2Error::invalid_request(&format!(
            "Missing required parameter: {name}"
        ))),
        None => Ok(()),
    }
}

/// Query parameters reporting `error` to a redirect URI
#[must_use]
pub fn error_params<'a>(error: &'a OAuth2Error, state: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("error", error.error.as_str())];
    if let Some(description) = error.error_description.as_deref() {
        params.push(("error_description", description));
    }
    if let Some(state) = state.filter(|s| !s.is_empty()) {
        params.push(("state", state));
    }
    params
}

/// Append query parameters to a registered redirect URI
///
/// # Errors
///
/// Returns `server_error` if the stored URI no longer parses
pub fn build_redirect(redirect_uri: &str, params: &[(&str, &str)]) -> Result<String, OAuth2Error> {
    let mut url = Url::parse(redirect_uri).map_err(|e| {
        error!(error = %e, "Registered redirect_uri failed to parse");
        OAuth2Error::server_error()
    })?;
    {
        let mut query = url.query_pairs_mut();
        for (name, value) in params {
            query.append_pair(name, value);
        }
    }
    Ok(url.into())
}
