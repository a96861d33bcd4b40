// ABOUTME: Shared server resources built once at startup and handed to every router
// ABOUTME: Wires storage, token signing, the authorization server, bearer auth, and rate limiting
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::database_plugins::factory::Database;
use crate::database_plugins::{OAuth2Store, UserStore};
use crate::errors::AppResult;
use crate::middleware::BearerAuthMiddleware;
use crate::oauth2_client::OAuthStateCodec;
use crate::oauth2_server::{OAuth2AuthorizationServer, OAuth2RateLimiter};

/// Centralized resource container, created once and shared via `Arc`
pub struct ServerResources {
    /// Storage engine
    pub database: Arc<Database>,
    /// Validated configuration
    pub config: Arc<ServerConfig>,
    /// Access token signer, absent when no issuer is configured
    pub auth_manager: Option<Arc<AuthManager>>,
    /// Authorization server, absent when no issuer is configured
    pub oauth2_server: Option<Arc<OAuth2AuthorizationServer>>,
    /// Bearer authentication for protected routes
    pub bearer_auth: BearerAuthMiddleware,
    /// Per-IP limiter for the OAuth endpoints
    pub rate_limiter: OAuth2RateLimiter,
    /// Signed state codec for external login round trips
    pub state_codec: Option<Arc<OAuthStateCodec>>,
}

impl ServerResources {
    /// Build resources from a storage engine and configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the OAuth settings are inconsistent
    pub fn new(database: Database, config: ServerConfig) -> AppResult<Self> {
        config.oauth2_server.validate()?;

        let database = Arc::new(database);
        let store: Arc<dyn OAuth2Store> = database.clone();
        let users: Arc<dyn UserStore> = database.clone();
        let oauth = &config.oauth2_server;

        let auth_manager = match (&oauth.issuer_url, &oauth.jwt_secret) {
            (Some(issuer), Some(secret)) => Some(Arc::new(AuthManager::new(
                secret.as_bytes(),
                issuer.clone(),
                Duration::seconds(oauth.access_token_ttl_secs),
            ))),
            _ => None,
        };

        let oauth2_server = auth_manager.as_ref().map(|auth_manager| {
            Arc::new(OAuth2AuthorizationServer::new(
                Arc::clone(&store),
                Arc::clone(&users),
                Arc::clone(auth_manager),
                oauth,
            ))
        });
        match &oauth.issuer_url {
            Some(issuer) if oauth2_server.is_some() => {
                info!(issuer = %issuer, "OAuth2 authorization server enabled");
            }
            _ => info!("OAuth2 authorization server disabled: OAUTH2_ISSUER_URL not set"),
        }

        let bearer_auth = BearerAuthMiddleware::new(
            auth_manager.clone(),
            users,
            oauth.resource_metadata_url(),
        );
        let rate_limiter = OAuth2RateLimiter::new(config.rate_limit.clone());
        let state_codec = oauth
            .effective_state_secret()
            .map(|secret| Arc::new(OAuthStateCodec::new(secret.as_bytes())));

        Ok(Self {
            database,
            config: Arc::new(config),
            auth_manager,
            oauth2_server,
            bearer_auth,
            rate_limiter,
            state_codec,
        })
    }

    /// Storage as the grant store trait object, for maintenance tasks
    #[must_use]
    pub fn oauth2_store(&self) -> Arc<dyn OAuth2Store> {
        self.database.clone()
    }
}
