// ABOUTME: HTTP tests for per-IP rate limiting of the OAuth2 endpoints
// ABOUTME: Verifies limit headers, 429 responses, per-endpoint budgets, and per-IP isolation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::Router;
use helpers::axum_test::AxumTestRequest;
use portfolio_authz::config::OAuth2RateLimitConfig;
use portfolio_authz::database_plugins::factory::Database;
use portfolio_authz::routes::build_router;
use serde_json::{json, Value};

fn limited_app(register_rpm: u32) -> Router {
    let mut config = common::test_config();
    config.rate_limit = OAuth2RateLimitConfig {
        enabled: true,
        window_secs: 60,
        register_rpm,
        authorize_rpm: 100,
        token_rpm: 100,
        cleanup_threshold: 10_000,
    };
    build_router(common::create_test_resources_with(Database::memory(), config).unwrap())
}

fn registration() -> Value {
    json!({ "client_name": "App", "redirect_uris": [common::TEST_REDIRECT_URI] })
}

fn addr(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([203, 0, 113, last_octet], 40000))
}

#[tokio::test]
async fn test_register_limit_returns_429_with_headers() {
    let app = limited_app(2);

    for expected_remaining in ["1", "0"] {
        let response = AxumTestRequest::post("/oauth/register")
            .json(&registration())
            .remote_addr(addr(1))
            .send(app.clone())
            .await
            .assert_status(StatusCode::CREATED);
        assert_eq!(response.header("x-ratelimit-limit").as_deref(), Some("2"));
        assert_eq!(
            response.header("x-ratelimit-remaining").as_deref(),
            Some(expected_remaining)
        );
        assert!(response.header("x-ratelimit-reset").is_some());
    }

    let response = AxumTestRequest::post("/oauth/register")
        .json(&registration())
        .remote_addr(addr(1))
        .send(app)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.header("retry-after").unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
    let body: Value = response.json();
    assert_eq!(body["error"], "temporarily_unavailable");
}

#[tokio::test]
async fn test_limits_are_per_ip() {
    let app = limited_app(1);

    AxumTestRequest::post("/oauth/register")
        .json(&registration())
        .remote_addr(addr(1))
        .send(app.clone())
        .await
        .assert_status(StatusCode::CREATED);
    AxumTestRequest::post("/oauth/register")
        .json(&registration())
        .remote_addr(addr(1))
        .send(app.clone())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
    AxumTestRequest::post("/oauth/register")
        .json(&registration())
        .remote_addr(addr(2))
        .send(app)
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_discovery_and_health_are_not_limited() {
    let app = limited_app(1);

    for _ in 0..3 {
        let response = AxumTestRequest::get("/.well-known/oauth-authorization-server")
            .remote_addr(addr(9))
            .send(app.clone())
            .await
            .assert_status(StatusCode::OK);
        assert!(response.header("x-ratelimit-limit").is_none());

        AxumTestRequest::get("/health")
            .remote_addr(addr(9))
            .send(app.clone())
            .await
            .assert_status(StatusCode::OK);
    }
}

#[tokio::test]
async fn test_register_budget_does_not_consume_token_budget() {
    let app = limited_app(1);

    AxumTestRequest::post("/oauth/register")
        .json(&registration())
        .remote_addr(addr(3))
        .send(app.clone())
        .await
        .assert_status(StatusCode::CREATED);

    let response = AxumTestRequest::post("/oauth/token")
        .form(&[("grant_type", "password")])
        .remote_addr(addr(3))
        .send(app)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.header("x-ratelimit-limit").as_deref(), Some("100"));
}
