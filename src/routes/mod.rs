// ABOUTME: Route module organization and top-level router assembly
// ABOUTME: Merges health, OAuth, and bearer-protected API routes under shared tower-http layers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! HTTP routes
//!
//! Each domain module only defines routes and thin handlers. Bearer
//! authentication is layered on the `/api` router alone so the token
//! endpoint can accept HTTP Basic client credentials.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::middleware::{bearer_auth, setup_cors};
use crate::oauth2_server::OAuth2Routes;
use crate::resources::ServerResources;

/// Bearer-protected API routes
pub mod api;
/// Health check routes
pub mod health;

/// Protected API route handlers
pub use api::ApiRoutes;
/// Health check route handlers
pub use health::HealthRoutes;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 64 * 1024;
/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Assemble the full application router
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let api_routes = ApiRoutes::routes().layer(middleware::from_fn_with_state(
        resources.bearer_auth.clone(),
        bearer_auth,
    ));

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(OAuth2Routes::routes(Arc::clone(&resources)))
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default();
                        info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %request.uri().path(),
                            request_id = %request_id,
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(setup_cors(&resources.config))
}
