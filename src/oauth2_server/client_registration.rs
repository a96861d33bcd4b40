// ABOUTME: OAuth 2.0 dynamic client registration implementation (RFC 7591)
// ABOUTME: Validates client metadata, issues credentials, and authenticates clients by secret
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use authz_core::constants::oauth::{
    AUTH_METHOD_CLIENT_SECRET_POST, GRANT_TYPE_AUTHORIZATION_CODE, GRANT_TYPE_REFRESH_TOKEN,
    MAX_CLIENT_NAME_LEN, MAX_REDIRECT_URIS, RESPONSE_TYPE_CODE, TOKEN_ENTROPY_BYTES,
};
use authz_core::errors::DatabaseError;
use chrono::Utc;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use super::models::{
    ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Error, OAuthClient,
};
use crate::crypto::{generate_hex_secret, hash_client_secret, verify_client_secret};
use crate::database_plugins::OAuth2Store;

/// OAuth 2.0 Client Registration Manager
pub struct ClientRegistrationManager {
    store: Arc<dyn OAuth2Store>,
}

impl ClientRegistrationManager {
    /// Creates a new client registration manager
    #[must_use]
    pub fn new(store: Arc<dyn OAuth2Store>) -> Self {
        Self { store }
    }

    /// Register a new OAuth 2.0 client (RFC 7591)
    ///
    /// The plaintext secret appears only in the returned response.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client_metadata` or `invalid_redirect_uri` for bad
    /// metadata, and `server_error` if credentials cannot be generated or stored
    pub async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        Self::validate_registration_request(&request)?;

        let client_id = Uuid::new_v4().to_string();
        let client_secret = generate_hex_secret(TOKEN_ENTROPY_BYTES).map_err(|e| {
            error!(error = %e, "Failed to generate client secret");
            OAuth2Error::server_error()
        })?;
        let client_secret_hash = hash_client_secret(&client_secret).await.map_err(|e| {
            error!(error = %e, "Failed to hash client secret");
            OAuth2Error::server_error()
        })?;

        let client_name = request.client_name.trim().to_owned();
        let created_at = Utc::now();
        let client = OAuthClient {
            client_id: client_id.clone(),
            client_secret_hash,
            client_name: client_name.clone(),
            redirect_uris: request.redirect_uris.clone(),
            created_at,
        };

        self.store.store_client(&client).await.map_err(|e| {
            error!(error = %e, client_id = %client_id, "Failed to store OAuth2 client registration");
            OAuth2Error::server_error()
        })?;

        info!(
            client_id = %client_id,
            redirect_uri_count = client.redirect_uris.len(),
            "Registered OAuth2 client"
        );

        Ok(ClientRegistrationResponse {
            client_id,
            client_secret,
            client_name,
            redirect_uris: request.redirect_uris,
            client_id_issued_at: created_at.timestamp(),
            client_secret_expires_at: 0,
            grant_types: vec![
                GRANT_TYPE_AUTHORIZATION_CODE.to_owned(),
                GRANT_TYPE_REFRESH_TOKEN.to_owned(),
            ],
            response_types: vec![RESPONSE_TYPE_CODE.to_owned()],
            token_endpoint_auth_method: AUTH_METHOD_CLIENT_SECRET_POST.to_owned(),
        })
    }

    /// Look up a registered client
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged
    pub async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>, DatabaseError> {
        self.store.get_client(client_id).await
    }

    /// Authenticate a client by id and secret
    ///
    /// Unknown clients and wrong secrets are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` on authentication failure and `server_error`
    /// if the store or the hashing task fails
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<OAuthClient, OAuth2Error> {
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(OAuth2Error::invalid_client());
        }

        let client = self.store.get_client(client_id).await.map_err(|e| {
            error!(error = %e, client_id = %client_id, "Failed to load OAuth2 client");
            OAuth2Error::server_error()
        })?;

        // Unknown ids still pay for an Argon2 verification
        let verified = verify_client_secret(
            client_secret,
            client.as_ref().map(|c| c.client_secret_hash.as_str()),
        )
        .await
        .map_err(|e| {
            error!(error = %e, client_id = %client_id, "Client secret verification failed to run");
            OAuth2Error::server_error()
        })?;

        let Some(client) = client else {
            warn!(client_id = %client_id, "Authentication attempted for unknown OAuth2 client");
            return Err(OAuth2Error::invalid_client());
        };
        if !verified {
            warn!(client_id = %client_id, "OAuth2 client secret validation failed");
            return Err(OAuth2Error::invalid_client());
        }

        Ok(client)
    }

    fn validate_registration_request(
        request: &ClientRegistrationRequest,
    ) -> Result<(), OAuth2Error> {
        let name = request.client_name.trim();
        if name.is_empty() {
            return Err(OAuth2Error::invalid_client_metadata(
                "client_name is required",
            ));
        }
        if name.chars().count() > MAX_CLIENT_NAME_LEN {
            return Err(OAuth2Error::invalid_client_metadata(&format!(
                "client_name must be at most {MAX_CLIENT_NAME_LEN} characters"
            )));
        }

        if request.redirect_uris.is_empty() {
            return Err(OAuth2Error::invalid_redirect_uri(
                "At least one redirect_uri is required",
            ));
        }
        if request.redirect_uris.len() > MAX_REDIRECT_URIS {
            return Err(OAuth2Error::invalid_redirect_uri(&format!(
                "At most {MAX_REDIRECT_URIS} redirect_uris may be registered"
            )));
        }

        for uri in &request.redirect_uris {
            Self::validate_redirect_uri(uri)?;
        }
        Ok(())
    }

    /// Absolute http(s) URI with a host, no fragment, no wildcard
    fn validate_redirect_uri(uri: &str) -> Result<(), OAuth2Error> {
        if uri.contains('*') {
            return Err(OAuth2Error::invalid_redirect_uri(&format!(
                "Wildcard redirect_uri is not allowed: {uri}"
            )));
        }
        let parsed = Url::parse(uri).map_err(|_| {
            OAuth2Error::invalid_redirect_uri(&format!("redirect_uri is not an absolute URI: {uri}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(OAuth2Error::invalid_redirect_uri(&format!(
                "redirect_uri must use http or https: {uri}"
            )));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(OAuth2Error::invalid_redirect_uri(&format!(
                "redirect_uri must include a host: {uri}"
            )));
        }
        if parsed.fragment().is_some() {
            return Err(OAuth2Error::invalid_redirect_uri(&format!(
                "redirect_uri must not contain a fragment: {uri}"
            )));
        }
        Ok(())
    }
}
