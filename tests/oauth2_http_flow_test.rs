// ABOUTME: End-to-end test of the full OAuth 2.1 flow over HTTP
// ABOUTME: Registration, consent, code exchange, protected API call, and refresh rotation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use helpers::axum_test::{query_param, AxumTestRequest};
use portfolio_authz::oauth2_server::pkce::compute_s256_challenge;
use portfolio_authz::oauth2_server::{ClientRegistrationResponse, TokenResponse};
use portfolio_authz::resources::ServerResources;
use portfolio_authz::routes::build_router;
use serde_json::{json, Value};

const VERIFIER: &str = "e2e-verifier-0123456789-abcdefghijklmnopqrstuvwxyz";
const STATE: &str = "opaque client state / with spaces";

async fn register(app: &Router) -> ClientRegistrationResponse {
    AxumTestRequest::post("/oauth/register")
        .json(&json!({
            "client_name": "E2E Client",
            "redirect_uris": [common::TEST_REDIRECT_URI],
        }))
        .send(app.clone())
        .await
        .assert_status(StatusCode::CREATED)
        .json()
}

fn authorize_params(client_id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("response_type", "code".to_owned()),
        ("client_id", client_id.to_owned()),
        ("redirect_uri", common::TEST_REDIRECT_URI.to_owned()),
        ("scope", "mcp".to_owned()),
        ("state", STATE.to_owned()),
        ("code_challenge", compute_s256_challenge(VERIFIER)),
        ("code_challenge_method", "S256".to_owned()),
    ]
}

async fn consent(app: &Router, client_id: &str) -> String {
    let query = serde_urlencoded::to_string(authorize_params(client_id)).unwrap();
    let page = AxumTestRequest::get(&format!("/oauth/authorize?{query}"))
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .text();
    assert!(page.contains("E2E Client"));

    let mut form = authorize_params(client_id);
    form.push(("email", common::TEST_EMAIL.to_owned()));
    form.push(("password", common::TEST_PASSWORD.to_owned()));
    form.push(("action", "approve".to_owned()));
    let response = AxumTestRequest::post("/oauth/authorize")
        .form(&form)
        .send(app.clone())
        .await
        .assert_status(StatusCode::FOUND);

    let location = response.location();
    assert_eq!(
        format!(
            "{}://{}{}",
            location.scheme(),
            location.host_str().unwrap(),
            location.path()
        ),
        common::TEST_REDIRECT_URI
    );
    assert_eq!(query_param(&location, "state").as_deref(), Some(STATE));
    query_param(&location, "code").unwrap()
}

async fn token(app: &Router, form: &[(&str, &str)]) -> (StatusCode, Value) {
    let response = AxumTestRequest::post("/oauth/token")
        .form(&form)
        .send(app.clone())
        .await;
    let status = response.status_code();
    (status, response.json())
}

async fn run_flow(resources: Arc<ServerResources>) {
    common::create_test_user(
        resources.database.as_ref(),
        common::TEST_EMAIL,
        common::TEST_PASSWORD,
    )
    .await
    .unwrap();
    let app = build_router(resources);

    let client = register(&app).await;
    let code = consent(&app, &client.client_id).await;

    let exchange = [
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", common::TEST_REDIRECT_URI),
        ("code_verifier", VERIFIER),
        ("client_id", client.client_id.as_str()),
        ("client_secret", client.client_secret.as_str()),
    ];
    let (status, body) = token(&app, &exchange).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let tokens: TokenResponse = serde_json::from_value(body).unwrap();

    let me: Value = AxumTestRequest::get("/api/me")
        .bearer(&tokens.access_token)
        .send(app.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(me["email"], common::TEST_EMAIL);
    assert_eq!(me["client_id"], client.client_id.as_str());

    // Code replay
    let (status, body) = token(&app, &exchange).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");

    // Rotation
    let refresh = [
        ("grant_type", "refresh_token"),
        ("refresh_token", tokens.refresh_token.as_str()),
        ("client_id", client.client_id.as_str()),
        ("client_secret", client.client_secret.as_str()),
    ];
    let (status, body) = token(&app, &refresh).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let rotated: TokenResponse = serde_json::from_value(body).unwrap();
    assert_ne!(rotated.refresh_token, tokens.refresh_token);

    let (status, body) = token(&app, &refresh).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");

    AxumTestRequest::get("/api/me")
        .bearer(&rotated.access_token)
        .send(app)
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_full_flow_memory() {
    run_flow(common::create_test_resources().unwrap()).await;
}

#[tokio::test]
async fn test_full_flow_sqlite() {
    run_flow(common::create_sqlite_resources().await.unwrap()).await;
}
