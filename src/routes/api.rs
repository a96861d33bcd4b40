// ABOUTME: API routes protected by bearer access tokens issued by this server
// ABOUTME: Exposes the caller's resolved identity as the reference protected resource
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use axum::routing::get;
use axum::{Json, Router};

use crate::middleware::{AuthenticatedUser, RequireAuth};

/// Protected API routes
pub struct ApiRoutes;

impl ApiRoutes {
    /// Create protected routes; callers layer bearer authentication on top
    pub fn routes() -> Router {
        Router::new().route("/api/me", get(handle_me))
    }
}

async fn handle_me(RequireAuth(user): RequireAuth) -> Json<AuthenticatedUser> {
    Json(user)
}
