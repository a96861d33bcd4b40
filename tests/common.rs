// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds server resources over memory or SQLite storage and drives the OAuth flow
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `portfolio_authz`

use std::sync::{Arc, Once};

use anyhow::Result;
use portfolio_authz::config::{DatabaseUrl, OAuth2RateLimitConfig, OAuth2ServerConfig, ServerConfig};
use portfolio_authz::database_plugins::factory::Database;
use portfolio_authz::database_plugins::UserStore;
use portfolio_authz::models::User;
use portfolio_authz::oauth2_server::pkce::compute_s256_challenge;
use portfolio_authz::oauth2_server::{
    AuthorizeRequest, ClientRegistrationRequest, ClientRegistrationResponse, ConsentForm,
    ConsentOutcome, OAuth2AuthorizationServer, TokenRequest,
};
use portfolio_authz::resources::ServerResources;

pub const TEST_ISSUER: &str = "https://auth.example.com";
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-0123456789abcdef-0123456789";
pub const TEST_REDIRECT_URI: &str = "https://app.example.com/callback";
pub const TEST_EMAIL: &str = "owner@example.com";
pub const TEST_PASSWORD: &str = "correct horse battery staple";
pub const TEST_STATE: &str = "xyz-state-123";
/// RFC 7636 appendix B verifier
pub const TEST_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Configuration with the authorization server enabled and rate limiting off
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database: DatabaseUrl::Memory,
        oauth2_server: OAuth2ServerConfig {
            issuer_url: Some(TEST_ISSUER.to_owned()),
            jwt_secret: Some(TEST_JWT_SECRET.to_owned()),
            ..OAuth2ServerConfig::default()
        },
        rate_limit: OAuth2RateLimitConfig::disabled(),
        ..ServerConfig::default()
    }
}

/// Resources over the in-memory engine
pub fn create_test_resources() -> Result<Arc<ServerResources>> {
    create_test_resources_with(Database::memory(), test_config())
}

/// Resources over an in-process SQLite database
pub async fn create_sqlite_resources() -> Result<Arc<ServerResources>> {
    init_test_logging();
    let database = Database::new("sqlite::memory:").await?;
    create_test_resources_with(database, test_config())
}

pub fn create_test_resources_with(
    database: Database,
    config: ServerConfig,
) -> Result<Arc<ServerResources>> {
    init_test_logging();
    Ok(Arc::new(ServerResources::new(database, config)?))
}

pub fn oauth2_server(resources: &ServerResources) -> Arc<OAuth2AuthorizationServer> {
    resources
        .oauth2_server
        .clone()
        .expect("authorization server should be configured")
}

/// Create an active user. Uses a low bcrypt cost to keep tests fast.
pub async fn create_test_user(
    users: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<User> {
    let hash = bcrypt::hash(password, 4)?;
    let user = User::new(email.to_owned(), hash, "Test Owner".to_owned());
    users.create_user(&user).await?;
    Ok(user)
}

pub async fn register_test_client(
    server: &OAuth2AuthorizationServer,
) -> Result<ClientRegistrationResponse> {
    let response = server
        .register_client(ClientRegistrationRequest {
            client_name: "Test MCP Client".to_owned(),
            redirect_uris: vec![TEST_REDIRECT_URI.to_owned()],
        })
        .await
        .map_err(|e| anyhow::anyhow!("registration failed: {e:?}"))?;
    Ok(response)
}

pub fn authorize_request(client_id: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: client_id.to_owned(),
        redirect_uri: TEST_REDIRECT_URI.to_owned(),
        scope: "mcp".to_owned(),
        state: TEST_STATE.to_owned(),
        code_challenge: compute_s256_challenge(TEST_VERIFIER),
        code_challenge_method: "S256".to_owned(),
    }
}

pub fn consent_form(client_id: &str, email: &str, password: &str) -> ConsentForm {
    ConsentForm {
        request: authorize_request(client_id),
        email: email.to_owned(),
        password: password.to_owned(),
        action: portfolio_authz::oauth2_server::models::ConsentAction::Approve,
    }
}

/// Approve consent and return the authorization code from the redirect
pub async fn obtain_auth_code(server: &OAuth2AuthorizationServer, client_id: &str) -> Result<String> {
    let outcome = server
        .handle_consent(&consent_form(client_id, TEST_EMAIL, TEST_PASSWORD))
        .await
        .map_err(|e| anyhow::anyhow!("consent rejected: {e:?}"))?;
    let ConsentOutcome::Redirect(location) = outcome else {
        anyhow::bail!("consent did not redirect");
    };
    let url = url::Url::parse(&location)?;
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| anyhow::anyhow!("redirect carried no code: {location}"))
}

pub fn code_exchange(client: &ClientRegistrationResponse, code: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "authorization_code".to_owned(),
        code: code.to_owned(),
        redirect_uri: TEST_REDIRECT_URI.to_owned(),
        code_verifier: TEST_VERIFIER.to_owned(),
        client_id: client.client_id.clone(),
        client_secret: client.client_secret.clone(),
        ..TokenRequest::default()
    }
}

pub fn refresh_exchange(client: &ClientRegistrationResponse, refresh_token: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "refresh_token".to_owned(),
        refresh_token: refresh_token.to_owned(),
        client_id: client.client_id.clone(),
        client_secret: client.client_secret.clone(),
        ..TokenRequest::default()
    }
}
