// ABOUTME: Integration tests for the well-known discovery documents and health endpoint
// ABOUTME: Checks RFC 8414 and RFC 9728 content and behavior when the server is unconfigured
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::http::StatusCode;
use helpers::axum_test::AxumTestRequest;
use portfolio_authz::config::OAuth2ServerConfig;
use portfolio_authz::database_plugins::factory::Database;
use portfolio_authz::routes::build_router;
use serde_json::Value;

#[tokio::test]
async fn test_authorization_server_metadata() {
    let resources = common::create_test_resources().unwrap();

    let body: Value = AxumTestRequest::get("/.well-known/oauth-authorization-server")
        .send(build_router(resources))
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_eq!(body["issuer"], common::TEST_ISSUER);
    assert_eq!(
        body["authorization_endpoint"],
        "https://auth.example.com/oauth/authorize"
    );
    assert_eq!(body["token_endpoint"], "https://auth.example.com/oauth/token");
    assert_eq!(
        body["registration_endpoint"],
        "https://auth.example.com/oauth/register"
    );
    assert_eq!(body["response_types_supported"], serde_json::json!(["code"]));
    assert_eq!(
        body["grant_types_supported"],
        serde_json::json!(["authorization_code", "refresh_token"])
    );
    assert_eq!(
        body["code_challenge_methods_supported"],
        serde_json::json!(["S256"])
    );
    assert_eq!(body["scopes_supported"], serde_json::json!(["mcp"]));
}

#[tokio::test]
async fn test_protected_resource_metadata_defaults_to_issuer() {
    let resources = common::create_test_resources().unwrap();

    let body: Value = AxumTestRequest::get("/.well-known/oauth-protected-resource")
        .send(build_router(resources))
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_eq!(body["resource"], common::TEST_ISSUER);
    assert_eq!(
        body["authorization_servers"],
        serde_json::json!([common::TEST_ISSUER])
    );
    assert_eq!(body["bearer_methods_supported"], serde_json::json!(["header"]));
}

#[tokio::test]
async fn test_protected_resource_uses_configured_resource() {
    let mut config = common::test_config();
    config.oauth2_server.resource_url = Some("https://mcp.example.com".to_owned());
    let resources = common::create_test_resources_with(Database::memory(), config).unwrap();

    let body: Value = AxumTestRequest::get("/.well-known/oauth-protected-resource")
        .send(build_router(resources))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(body["resource"], "https://mcp.example.com");
    assert_eq!(
        body["authorization_servers"],
        serde_json::json!([common::TEST_ISSUER])
    );
}

#[tokio::test]
async fn test_unconfigured_server_serves_no_oauth_documents() {
    let mut config = common::test_config();
    config.oauth2_server = OAuth2ServerConfig::default();
    let resources = common::create_test_resources_with(Database::memory(), config).unwrap();
    let app = build_router(resources);

    for path in [
        "/.well-known/oauth-authorization-server",
        "/.well-known/oauth-protected-resource",
        "/oauth/authorize?client_id=x",
    ] {
        AxumTestRequest::get(path)
            .send(app.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    let body: Value = AxumTestRequest::get("/health")
        .send(app)
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(body["oauth2_server"], false);
}

#[tokio::test]
async fn test_health_reports_storage_and_request_id() {
    let resources = common::create_test_resources().unwrap();

    let response = AxumTestRequest::get("/health")
        .send(build_router(resources))
        .await
        .assert_status(StatusCode::OK);
    assert!(response.header("x-request-id").is_some());
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "portfolio-authz");
    assert_eq!(body["storage"], "In-memory");
    assert_eq!(body["oauth2_server"], true);
}
