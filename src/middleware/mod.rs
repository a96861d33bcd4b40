// ABOUTME: HTTP middleware for bearer authentication and cross-origin access
// ABOUTME: Request tracing and request ids are provided by tower-http layers in the router
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Bearer token authentication
pub mod auth;
/// CORS configuration
pub mod cors;

pub use auth::{
    bearer_auth, AuthenticatedUser, BearerAuthError, BearerAuthMiddleware, BearerChallenge,
    RequireAuth,
};
pub use cors::setup_cors;
